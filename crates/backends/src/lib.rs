//! Generation backend implementations for deskclaw.
//!
//! Three interchangeable backends plus a fallback chain:
//! - [`ChatCompletionBackend`] — OpenAI-compatible chat API
//! - [`InferenceApiBackend`] — hosted text-inference endpoint
//! - [`RuleBackend`] — deterministic rule table, always available
//!
//! [`build_backend`] assembles the configured backend; remote backends
//! are always chained onto the rule backend so generation never fails
//! the pipeline.

pub mod chain;
pub mod chat_completion;
pub mod inference_api;
pub mod rules;

pub use chain::ChainBackend;
pub use chat_completion::ChatCompletionBackend;
pub use inference_api::InferenceApiBackend;
pub use rules::{RuleBackend, DEFAULT_CLARIFICATION};

use deskclaw_config::AppConfig;
use deskclaw_core::backend::GenerationBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the configured generation backend.
///
/// A remote selection without an API key falls back to the rule backend
/// rather than failing at startup.
pub fn build_backend(config: &AppConfig) -> Arc<dyn GenerationBackend> {
    let rules = Arc::new(RuleBackend::new(&config.bot_name));
    let timeout = Duration::from_secs(config.backend.timeout_secs);

    match (config.backend.kind.as_str(), &config.backend.api_key) {
        ("chat_completion", Some(key)) => {
            info!(model = %config.backend.model, "Using chat-completion backend");
            let remote = Arc::new(ChatCompletionBackend::new(
                &config.backend.api_url,
                key,
                &config.backend.model,
                &config.bot_name,
            ));
            Arc::new(
                ChainBackend::new("chat_completion_chain")
                    .add(remote, timeout)
                    .add_default(rules),
            )
        }
        ("hosted_inference", Some(key)) => {
            info!(model = %config.backend.model, "Using hosted-inference backend");
            let remote = Arc::new(InferenceApiBackend::new(
                key,
                &config.backend.model,
                &config.bot_name,
            ));
            Arc::new(
                ChainBackend::new("hosted_inference_chain")
                    .add(remote, timeout)
                    .add_default(rules),
            )
        }
        (kind, None) if kind != "rules" => {
            info!(kind, "No API key configured, using rule backend");
            rules
        }
        _ => {
            info!("Using rule backend");
            rules
        }
    }
}

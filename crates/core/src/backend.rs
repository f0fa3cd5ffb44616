//! GenerationBackend trait — the abstraction over free-form reply
//! producers.
//!
//! A backend takes the customer's message plus prior turns and produces
//! a reply with a confidence estimate. The orchestrator calls `generate`
//! without knowing which backend is configured — hosted inference, a
//! chat-completion API, or the deterministic rule table.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::turn::Turn;

/// A generated reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generated {
    /// The reply text
    pub text: String,

    /// Backend-reported certainty in [0,1]
    pub confidence: f32,

    /// Which backend produced it (e.g. "rules", "chat_completion")
    pub source: String,
}

/// The core generation trait.
///
/// Selection among implementations is a static configuration choice;
/// callers never branch on the concrete type.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A short name for this backend (e.g. "rules", "hosted_inference").
    fn name(&self) -> &str;

    /// Generate a reply to `message` given `prior_turns` (oldest first).
    async fn generate(
        &self,
        message: &str,
        prior_turns: &[Turn],
    ) -> std::result::Result<Generated, BackendError>;

    /// Summarize a conversation in a few sentences.
    ///
    /// Default implementation produces a counted fallback summary, the
    /// way the rule backend does.
    async fn summarize(&self, turns: &[Turn]) -> std::result::Result<String, BackendError> {
        Ok(fallback_summary(turns))
    }
}

/// Counted fallback summary used when no generative summarizer is
/// available.
pub fn fallback_summary(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "No conversation to summarize.".into();
    }
    let user = turns
        .iter()
        .filter(|t| t.role == crate::turn::Role::User)
        .count();
    let bot = turns.len() - user;
    format!(
        "Conversation with {user} customer messages and {bot} agent responses. \
         Recent discussion about customer inquiry."
    )
}

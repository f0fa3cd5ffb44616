//! Configuration loading, validation, and management for deskclaw.
//!
//! Loads configuration from `~/.deskclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.deskclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Display name used in generated replies
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Base confidence threshold. The FAQ match floor is half of this.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Generation backend selection and credentials
    #[serde(default)]
    pub backend: BackendConfig,

    /// Context window and cache settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Escalation classifier keyword lists
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Durable store settings
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_bot_name() -> String {
    "CustomerSupportBot".into()
}
fn default_confidence_threshold() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_name", &self.bot_name)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("backend", &self.backend)
            .field("context", &self.context)
            .field("classifier", &self.classifier)
            .field("store", &self.store)
            .finish()
    }
}

/// Which generation backend to use. Selection is static configuration,
/// not runtime negotiation.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// "rules", "hosted_inference", or "chat_completion"
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for the chat-completion API
    #[serde(default = "default_chat_api_url")]
    pub api_url: String,

    /// Model identifier for remote backends
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout before falling back to the rule backend
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_kind() -> String {
    "rules".into()
}
fn default_chat_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_backend_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            api_key: None,
            api_url: default_chat_api_url(),
            model: default_model(),
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Context window and cache staleness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum turns kept in the rolling window
    #[serde(default = "default_max_window")]
    pub max_window: usize,

    /// A cache entry older than this is rebuilt from the store
    #[serde(default = "default_stale_ttl_secs")]
    pub stale_ttl_secs: u64,

    /// A cache entry idle longer than this is evicted by the sweep
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// How often the sweep task runs
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_window() -> usize {
    10
}
fn default_stale_ttl_secs() -> u64 {
    5 * 60
}
fn default_idle_ttl_secs() -> u64 {
    15 * 60
}
fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

impl ContextConfig {
    pub fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ttl_secs)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_window: default_max_window(),
            stale_ttl_secs: default_stale_ttl_secs(),
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Keyword lists driving the escalation cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Explicit hand-off requests; rule 1, dominates everything
    #[serde(default = "default_escalation_keywords")]
    pub escalation_keywords: Vec<String>,

    #[serde(default = "default_frustration_indicators")]
    pub frustration_indicators: Vec<String>,

    #[serde(default = "default_technical_keywords")]
    pub technical_keywords: Vec<String>,

    #[serde(default = "default_billing_keywords")]
    pub billing_keywords: Vec<String>,
}

fn default_escalation_keywords() -> Vec<String> {
    ["human", "agent", "manager", "escalate", "speak to someone"]
        .map(String::from)
        .to_vec()
}

fn default_frustration_indicators() -> Vec<String> {
    [
        "frustrated",
        "annoyed",
        "angry",
        "upset",
        "disappointed",
        "not working",
        "broken",
        "terrible",
        "awful",
        "useless",
        "waste of time",
        "ridiculous",
        "stupid",
        "horrible",
    ]
    .map(String::from)
    .to_vec()
}

fn default_technical_keywords() -> Vec<String> {
    [
        "api error",
        "server error",
        "500 error",
        "404 error",
        "database",
        "integration",
        "webhook",
        "authentication",
        "ssl",
        "certificate",
        "timeout",
        "connection failed",
    ]
    .map(String::from)
    .to_vec()
}

fn default_billing_keywords() -> Vec<String> {
    [
        "billing",
        "payment",
        "charge",
        "refund",
        "subscription",
        "invoice",
        "credit card",
        "paypal",
        "transaction",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            escalation_keywords: default_escalation_keywords(),
            frustration_indicators: default_frustration_indicators(),
            technical_keywords: default_technical_keywords(),
            billing_keywords: default_billing_keywords(),
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path. `:memory:` for an ephemeral store.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Seed the default FAQ set when the table is empty
    #[serde(default = "default_true")]
    pub seed_faqs: bool,
}

fn default_db_path() -> String {
    "deskclaw.db".into()
}
fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            seed_faqs: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deskclaw/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DESKCLAW_API_KEY` / `OPENAI_API_KEY` for the backend key
    /// - `DESKCLAW_BACKEND` to override the backend kind
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.backend.api_key.is_none() {
            config.backend.api_key = std::env::var("DESKCLAW_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(kind) = std::env::var("DESKCLAW_BACKEND") {
            config.backend.kind = kind;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deskclaw")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.context.max_window == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_window must be at least 1".into(),
            ));
        }

        if self.context.idle_ttl_secs < self.context.stale_ttl_secs {
            return Err(ConfigError::ValidationError(
                "context.idle_ttl_secs must be >= context.stale_ttl_secs".into(),
            ));
        }

        match self.backend.kind.as_str() {
            "rules" | "hosted_inference" | "chat_completion" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown backend kind: {other}"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            confidence_threshold: default_confidence_threshold(),
            backend: BackendConfig::default(),
            context: ContextConfig::default(),
            classifier: ClassifierConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.kind, "rules");
        assert_eq!(config.context.max_window, 10);
        assert_eq!(config.context.stale_ttl_secs, 300);
        assert_eq!(config.context.idle_ttl_secs, 900);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.bot_name, config.bot_name);
        assert_eq!(parsed.context.max_window, config.context.max_window);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let config = AppConfig {
            confidence_threshold: 1.5,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_kind_rejected() {
        let mut config = AppConfig::default();
        config.backend.kind = "quantum".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn idle_ttl_must_cover_stale_ttl() {
        let mut config = AppConfig::default();
        config.context.stale_ttl_secs = 600;
        config.context.idle_ttl_secs = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().bot_name, "CustomerSupportBot");
    }

    #[test]
    fn classifier_defaults_include_human_keyword() {
        let config = ClassifierConfig::default();
        assert!(config.escalation_keywords.iter().any(|k| k == "human"));
        assert!(config.billing_keywords.iter().any(|k| k == "refund"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = AppConfig::default();
        config.backend.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}

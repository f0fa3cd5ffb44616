//! Deterministic rule-table backend.
//!
//! Always available, no network, no credentials. Used directly when no
//! remote backend is configured, and as the last link of every fallback
//! chain so generation never fails the pipeline.

use async_trait::async_trait;
use deskclaw_core::backend::{fallback_summary, Generated, GenerationBackend};
use deskclaw_core::error::BackendError;
use deskclaw_core::turn::Turn;

const SOURCE: &str = "rules";

/// A static rule table over the incoming message.
pub struct RuleBackend {
    bot_name: String,
}

impl RuleBackend {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }

    fn greeting(&self) -> String {
        format!(
            "Hello! I'm {}, your customer support assistant. How can I help you today?",
            self.bot_name
        )
    }
}

/// The default clarification reply, emitted at confidence 0.3.
pub const DEFAULT_CLARIFICATION: &str = "I understand you're asking about something, but I'd \
    like to make sure I give you the most accurate information. Could you please rephrase your \
    question or provide more details? If you need immediate assistance, I can connect you with \
    a human agent.";

fn starts_with_any(message: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| message.starts_with(p))
}

fn contains_any(message: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| message.contains(n))
}

#[async_trait]
impl GenerationBackend for RuleBackend {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn generate(
        &self,
        message: &str,
        _prior_turns: &[Turn],
    ) -> Result<Generated, BackendError> {
        let lower = message.trim().to_lowercase();

        // Greeting patterns
        if starts_with_any(
            &lower,
            &[
                "hi",
                "hello",
                "hey",
                "good morning",
                "good afternoon",
                "good evening",
            ],
        ) {
            return Ok(Generated {
                text: self.greeting(),
                confidence: 0.9,
                source: SOURCE.into(),
            });
        }

        // Gratitude patterns
        if contains_any(&lower, &["thank you", "thanks", "appreciate"]) {
            return Ok(Generated {
                text: "You're welcome! Is there anything else I can help you with today?".into(),
                confidence: 0.9,
                source: SOURCE.into(),
            });
        }

        // Goodbye patterns
        if contains_any(&lower, &["bye", "goodbye", "see you", "have a good"]) {
            return Ok(Generated {
                text: "Thank you for contacting us! Have a great day, and don't hesitate to \
                       reach out if you need any further assistance."
                    .into(),
                confidence: 0.9,
                source: SOURCE.into(),
            });
        }

        Ok(Generated {
            text: DEFAULT_CLARIFICATION.into(),
            confidence: 0.3,
            source: SOURCE.into(),
        })
    }

    async fn summarize(&self, turns: &[Turn]) -> Result<String, BackendError> {
        Ok(fallback_summary(turns))
    }
}

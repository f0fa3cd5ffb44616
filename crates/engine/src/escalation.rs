//! Escalation classifier — the keyword cascade that decides when a
//! conversation needs a human.
//!
//! The cascade is a fixed-order short circuit: explicit hand-off request,
//! repetition, frustration, technical issue, billing, extended
//! conversation. The first rule that fires wins; nothing ever combines.
//! Classification is pure and synchronous.

use deskclaw_config::ClassifierConfig;
use deskclaw_core::escalation::EscalationPriority;
use deskclaw_core::relevance;
use deskclaw_core::turn::{Role, Turn};

/// Average pairwise similarity above this means the customer is asking
/// the same thing over and over.
const REPETITION_THRESHOLD: f32 = 0.6;

/// How many recent turns the repetition check looks at.
const REPETITION_WINDOW: usize = 6;

/// The classifier's verdict for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub escalate: bool,
    pub reason: String,
    pub priority: EscalationPriority,
    pub confidence: f32,
}

impl Decision {
    fn escalate(reason: &str, priority: EscalationPriority, confidence: f32) -> Self {
        Self {
            escalate: true,
            reason: reason.into(),
            priority,
            confidence,
        }
    }
}

/// Stateless escalation classifier driven by configured keyword lists.
pub struct EscalationClassifier {
    config: ClassifierConfig,
}

impl EscalationClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Run the cascade for `message` given the conversation `history`
    /// (oldest first, current user turn already appended).
    pub fn classify(&self, message: &str, history: &[Turn]) -> Decision {
        let lower = message.to_lowercase();
        let contains_any =
            |keywords: &[String]| keywords.iter().any(|k| lower.contains(k.as_str()));

        if contains_any(&self.config.escalation_keywords) {
            return Decision::escalate(
                "Customer explicitly requested human assistance",
                EscalationPriority::High,
                0.9,
            );
        }

        if self.is_repeating(history) {
            return Decision::escalate(
                "Customer repeating similar questions - may need human assistance",
                EscalationPriority::Medium,
                0.7,
            );
        }

        if contains_any(&self.config.frustration_indicators) {
            return Decision::escalate(
                "Customer showing signs of frustration",
                EscalationPriority::High,
                0.8,
            );
        }

        if contains_any(&self.config.technical_keywords) && history.len() > 2 {
            return Decision::escalate(
                "Complex technical issue detected",
                EscalationPriority::Medium,
                0.6,
            );
        }

        if contains_any(&self.config.billing_keywords) {
            return Decision::escalate(
                "Billing/payment related inquiry",
                EscalationPriority::High,
                0.8,
            );
        }

        if history.len() > 10 {
            let user = history.iter().filter(|t| t.role == Role::User).count();
            let bot = history.iter().filter(|t| t.role == Role::Bot).count();
            if user > 5 && bot > 5 {
                return Decision::escalate(
                    "Extended conversation without resolution",
                    EscalationPriority::Medium,
                    0.6,
                );
            }
        }

        Decision {
            escalate: false,
            reason: "Query within bot capabilities".into(),
            priority: EscalationPriority::Low,
            confidence: 0.3,
        }
    }

    /// The repetition check: user turns within the last six turns, at
    /// least three of them, with a high average pairwise similarity.
    fn is_repeating(&self, history: &[Turn]) -> bool {
        let start = history.len().saturating_sub(REPETITION_WINDOW);
        let recent: Vec<&str> = history[start..]
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.body.as_str())
            .collect();

        if recent.len() < 3 {
            return false;
        }

        let mut similarities = Vec::new();
        for i in 0..recent.len() - 1 {
            for j in i + 1..recent.len() {
                similarities.push(relevance::similarity(recent[i], recent[j]));
            }
        }

        let avg = similarities.iter().sum::<f32>() / similarities.len() as f32;
        avg > REPETITION_THRESHOLD
    }
}

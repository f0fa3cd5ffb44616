//! The outcome returned to the calling layer for each processed message.

use serde::{Deserialize, Serialize};

use crate::escalation::EscalationPriority;
use crate::session::SessionId;

/// Which branch of the pipeline produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Escalation,
    Faq,
    LlmResponse,
    Error,
    /// Escalation was warranted but the ticket could not be created
    EscalationError,
}

/// Branch-specific payload attached to an outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeDetail {
    Escalation {
        ticket_id: i64,
        reason: String,
        priority: EscalationPriority,
    },
    Faq {
        question: String,
        category: String,
    },
}

/// The well-formed result of `process_message`. Always returned, even
/// when a collaborator failed internally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub session_id: SessionId,

    /// The final message shown to the customer
    pub message: String,

    pub kind: OutcomeKind,

    /// Heuristic or backend-reported certainty in [0,1]
    pub confidence: f32,

    /// Which component produced the message (e.g. "faq_database",
    /// "escalation_service", "rules", "chat_completion")
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<OutcomeDetail>,
}

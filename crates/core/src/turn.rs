//! Turn domain types.
//!
//! A turn is one message in a conversation: the user writes, the bot
//! answers. Turns are append-only; they are never mutated or deleted
//! except in bulk with their session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionId;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The customer
    User,
    /// The bot
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

/// What kind of response a turn carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    /// Free-form text (user input or generated reply)
    Text,
    /// Answer drawn from the FAQ knowledge base
    Faq,
    /// Hand-off message for a human escalation
    Escalation,
    /// Apology emitted on an internal failure
    Error,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Text => "text",
            TurnKind::Faq => "faq",
            TurnKind::Escalation => "escalation",
            TurnKind::Error => "error",
        }
    }
}

/// A single message in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// The session this turn belongs to
    pub session_id: SessionId,

    /// Who sent it
    pub role: Role,

    /// The text body
    pub body: String,

    /// Response kind tag
    pub kind: TurnKind,

    /// Heuristic or backend-reported certainty in [0,1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn (always plain text, no confidence).
    pub fn user(session_id: &SessionId, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            role: Role::User,
            body: body.into(),
            kind: TurnKind::Text,
            confidence: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a bot turn of the given kind.
    pub fn bot(
        session_id: &SessionId,
        body: impl Into<String>,
        kind: TurnKind,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            role: Role::Bot,
            body: body.into(),
            kind,
            confidence: Some(confidence),
            timestamp: Utc::now(),
        }
    }
}

/// Per-session message statistics from the turn store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnStats {
    pub total: u64,
    pub user_turns: u64,
    pub bot_turns: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_has_no_confidence() {
        let sid = SessionId::new();
        let turn = Turn::user(&sid, "hello");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.kind, TurnKind::Text);
        assert!(turn.confidence.is_none());
    }

    #[test]
    fn bot_turn_carries_kind_and_confidence() {
        let sid = SessionId::new();
        let turn = Turn::bot(&sid, "answer", TurnKind::Faq, 0.85);
        assert_eq!(turn.role, Role::Bot);
        assert_eq!(turn.kind, TurnKind::Faq);
        assert_eq!(turn.confidence, Some(0.85));
    }

    #[test]
    fn turn_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TurnKind::Escalation).unwrap();
        assert_eq!(json, "\"escalation\"");
    }
}

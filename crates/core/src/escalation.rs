//! Escalation domain types.
//!
//! An escalation is the record of handing a session over to a human
//! agent. Status transitions only move forward: pending -> in_progress
//! -> resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Lifecycle status of an escalation. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    InProgress,
    Resolved,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::Pending => "pending",
            EscalationStatus::InProgress => "in_progress",
            EscalationStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EscalationStatus::Pending),
            "in_progress" => Some(EscalationStatus::InProgress),
            "resolved" => Some(EscalationStatus::Resolved),
            _ => None,
        }
    }

    /// Whether a transition to `next` moves the lifecycle forward.
    pub fn can_transition_to(&self, next: EscalationStatus) -> bool {
        matches!(
            (self, next),
            (EscalationStatus::Pending, EscalationStatus::InProgress)
                | (EscalationStatus::Pending, EscalationStatus::Resolved)
                | (EscalationStatus::InProgress, EscalationStatus::Resolved)
        )
    }
}

impl std::fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency assigned by the escalation classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationPriority {
    Low,
    Medium,
    High,
}

impl EscalationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationPriority::Low => "low",
            EscalationPriority::Medium => "medium",
            EscalationPriority::High => "high",
        }
    }
}

/// A hand-off record for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    /// Store-assigned ticket ID
    pub id: i64,

    pub session_id: SessionId,

    /// Free-text reason produced by the classifier
    pub reason: String,

    pub status: EscalationStatus,

    pub created_at: DateTime<Utc>,

    /// Stamped when the status reaches `Resolved`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    /// Agent identifier recorded at resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// The hand-off category, derived from a classifier reason.
///
/// Derivation is a single ordered match over the reason text; anything
/// that matches no category fails closed to `HumanRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCategory {
    HumanRequest,
    BillingIssue,
    TechnicalIssue,
    Frustration,
    ComplexQuery,
    ExtendedConversation,
}

impl EscalationCategory {
    /// Classify a free-text reason into a category. First match wins.
    pub fn from_reason(reason: &str) -> Self {
        let reason = reason.to_lowercase();
        let contains = |needles: &[&str]| needles.iter().any(|n| reason.contains(n));

        if contains(&["human", "agent"]) {
            EscalationCategory::HumanRequest
        } else if contains(&["billing", "payment"]) {
            EscalationCategory::BillingIssue
        } else if contains(&["technical", "error"]) {
            EscalationCategory::TechnicalIssue
        } else if contains(&["frustration", "frustrated"]) {
            EscalationCategory::Frustration
        } else if contains(&["complex"]) {
            EscalationCategory::ComplexQuery
        } else if contains(&["extended", "conversation"]) {
            EscalationCategory::ExtendedConversation
        } else {
            EscalationCategory::HumanRequest
        }
    }

    /// The templated hand-off message shown to the customer.
    pub fn handoff_message(&self) -> &'static str {
        match self {
            EscalationCategory::HumanRequest => {
                "I understand you'd like to speak with a human agent. Let me connect you \
                 with one of our support specialists who can provide more personalized assistance."
            }
            EscalationCategory::TechnicalIssue => {
                "I see you're experiencing a technical issue that may require specialized \
                 support. I'm connecting you with our technical support team who can provide \
                 more detailed assistance."
            }
            EscalationCategory::BillingIssue => {
                "For billing and payment related matters, I'll connect you with our billing \
                 support team who can access your account details and provide accurate \
                 information about your charges and payments."
            }
            EscalationCategory::Frustration => {
                "I apologize that we haven't been able to resolve your concern to your \
                 satisfaction. Let me connect you with a senior support agent who can provide \
                 more comprehensive assistance."
            }
            EscalationCategory::ComplexQuery => {
                "Your inquiry requires more detailed attention than I can provide. I'm \
                 escalating your case to our specialist team who can give you the thorough \
                 support you deserve."
            }
            EscalationCategory::ExtendedConversation => {
                "I want to ensure you get the best possible help. Since we've been discussing \
                 this for a while, let me connect you with a human agent who can provide more \
                 personalized assistance."
            }
        }
    }
}

/// Aggregate escalation statistics over a trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationStats {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub resolved: u64,
    /// Mean time from creation to resolution, in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_resolution_days: Option<f64>,
}

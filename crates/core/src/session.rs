//! Session domain types.
//!
//! A session is one customer conversation: created on first contact,
//! touched on every turn, and ended explicitly, at which point it becomes
//! read-only history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session (opaque token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A customer conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// Optional external user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Free-form session metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Whether the session is still live
    pub is_active: bool,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When the session was last touched
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session.
    pub fn new(user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            metadata: serde_json::Map::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update applied to a session.
///
/// `None` fields are left untouched; the store always refreshes
/// `updated_at` when a patch is applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl SessionPatch {
    pub fn activity() -> Self {
        Self {
            metadata: None,
            is_active: Some(true),
        }
    }

    pub fn metadata(metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            metadata: Some(metadata),
            is_active: None,
        }
    }
}

//! Store traits — the durable-persistence seam.
//!
//! The pipeline only ever talks to these traits; the concrete store
//! (SQLite in production, in-memory in tests) is injected at startup.
//! These calls are the pipeline's only suspension points besides the
//! generation backend.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::escalation::{Escalation, EscalationStats, EscalationStatus};
use crate::faq::{FaqEntry, FaqPatch, NewFaq};
use crate::session::{Session, SessionId, SessionPatch};
use crate::turn::{Role, Turn, TurnKind, TurnStats};

/// Persistence for conversation sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new active session.
    async fn create(
        &self,
        user_id: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Session, StoreError>;

    /// Look up a session by ID.
    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Apply a partial update; always refreshes the activity timestamp.
    async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<(), StoreError>;

    /// List all active sessions, most recently touched first.
    async fn list_active(&self) -> Result<Vec<Session>, StoreError>;

    /// Mark a session inactive. It becomes read-only history.
    async fn end(&self, id: &SessionId) -> Result<(), StoreError>;
}

/// Append-only persistence for conversation turns.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append a turn. Never skipped, even when a cache entry is absent.
    async fn append(
        &self,
        session_id: &SessionId,
        body: &str,
        role: Role,
        kind: TurnKind,
        confidence: Option<f32>,
    ) -> Result<Turn, StoreError>;

    /// The most recent `n` turns, ordered oldest -> newest.
    async fn recent_window(&self, session_id: &SessionId, n: usize)
        -> Result<Vec<Turn>, StoreError>;

    /// Full history up to `limit`, ordered oldest -> newest.
    async fn full_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Per-session message statistics.
    async fn summary_stats(&self, session_id: &SessionId) -> Result<TurnStats, StoreError>;

    /// Bulk-delete every turn of a session.
    async fn delete_all(&self, session_id: &SessionId) -> Result<u64, StoreError>;
}

/// Persistence for the FAQ knowledge base.
///
/// `query` is a plain substring search; the matcher layers its
/// relevance tiers on top of the candidates it returns. Matching never
/// mutates entries.
#[async_trait]
pub trait FaqStore: Send + Sync {
    /// Substring search over question, answer, and keywords, ordered by
    /// stored priority with insertion order as the tie-break. `filter`
    /// of `None` returns everything (admin listing); `category` narrows
    /// either way.
    async fn query(
        &self,
        filter: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<FaqEntry>, StoreError>;

    async fn create(&self, faq: NewFaq) -> Result<FaqEntry, StoreError>;

    async fn update(&self, id: i64, patch: FaqPatch) -> Result<bool, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Distinct category labels with entry counts.
    async fn categories(&self) -> Result<Vec<(String, u64)>, StoreError>;
}

/// Persistence for escalation tickets.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Create a ticket with initial status `Pending`.
    async fn create(&self, session_id: &SessionId, reason: &str)
        -> Result<Escalation, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Escalation>, StoreError>;

    /// All tickets for a session, newest first.
    async fn list_by_session(&self, session_id: &SessionId)
        -> Result<Vec<Escalation>, StoreError>;

    /// Forward-only status update; `Resolved` stamps the resolution time.
    async fn update_status(
        &self,
        id: i64,
        status: EscalationStatus,
        resolved_by: Option<&str>,
    ) -> Result<(), StoreError>;

    /// All tickets, optionally filtered by status, newest first.
    async fn list_all(
        &self,
        status: Option<EscalationStatus>,
    ) -> Result<Vec<Escalation>, StoreError>;

    /// Aggregate statistics over a trailing window of days.
    async fn stats(&self, window_days: u32) -> Result<EscalationStats, StoreError>;
}

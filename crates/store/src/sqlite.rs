//! SQLite store backing all four persistence traits.
//!
//! One database file, four tables:
//! - `sessions` — conversation sessions with JSON metadata
//! - `turns` — append-only message log
//! - `faqs` — curated knowledge base
//! - `escalations` — human hand-off tickets
//!
//! Timestamps are stored as RFC 3339 text; session metadata as a JSON
//! blob. WAL journaling keeps concurrent reads cheap.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use deskclaw_core::error::StoreError;
use deskclaw_core::escalation::{Escalation, EscalationStats, EscalationStatus};
use deskclaw_core::faq::{FaqEntry, FaqPatch, NewFaq};
use deskclaw_core::session::{Session, SessionId, SessionPatch};
use deskclaw_core::store::{EscalationStore, FaqStore, SessionStore, TurnStore};
use deskclaw_core::turn::{Role, Turn, TurnKind, TurnStats};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// The production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT,
                metadata    TEXT NOT NULL DEFAULT '{}',
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT UNIQUE NOT NULL,
                session_id  TEXT NOT NULL REFERENCES sessions(id),
                role        TEXT NOT NULL,
                body        TEXT NOT NULL,
                kind        TEXT NOT NULL DEFAULT 'text',
                confidence  REAL,
                timestamp   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS faqs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                question    TEXT NOT NULL,
                answer      TEXT NOT NULL,
                keywords    TEXT NOT NULL DEFAULT '',
                category    TEXT NOT NULL DEFAULT 'general',
                priority    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("faqs table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS escalations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(id),
                reason      TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pending',
                created_at  TEXT NOT NULL,
                resolved_at TEXT,
                resolved_by TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("escalations table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_escalations_session ON escalations(session_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("escalations index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Insert the starter FAQ set if the table is empty.
    ///
    /// Idempotent: an already-populated knowledge base is left alone.
    pub async fn seed_faqs(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM faqs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("FAQ count: {e}")))?;
        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        if cnt > 0 {
            return Ok(0);
        }

        let seeds: &[(&str, &str, &str, &str, i32)] = &[
            (
                "What are your business hours?",
                "Our business hours are Monday to Friday, 9 AM to 6 PM EST. We also offer \
                 24/7 emergency support for critical issues.",
                "hours,time,available,when,open,closed",
                "general",
                1,
            ),
            (
                "How do I reset my password?",
                "To reset your password, click on the 'Forgot Password' link on the login \
                 page, enter your email address, and follow the instructions sent to your email.",
                "password,reset,forgot,login,access",
                "account",
                2,
            ),
            (
                "What payment methods do you accept?",
                "We accept all major credit cards (Visa, MasterCard, American Express), \
                 PayPal, and bank transfers for business accounts.",
                "payment,credit card,paypal,billing,pay",
                "billing",
                2,
            ),
            (
                "How can I cancel my subscription?",
                "You can cancel your subscription anytime from your account settings page. \
                 Go to Billing > Subscription > Cancel. Your access will continue until the \
                 end of your billing period.",
                "cancel,subscription,stop,end,terminate",
                "billing",
                1,
            ),
            (
                "Do you offer refunds?",
                "Yes, we offer a 30-day money-back guarantee for all new subscriptions. \
                 Contact our support team to process your refund.",
                "refund,money back,return,guarantee",
                "billing",
                2,
            ),
        ];

        let now = Utc::now().to_rfc3339();
        for (question, answer, keywords, category, priority) in seeds {
            sqlx::query(
                r#"
                INSERT INTO faqs (question, answer, keywords, category, priority, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
            )
            .bind(question)
            .bind(answer)
            .bind(keywords)
            .bind(category)
            .bind(priority)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("FAQ seed insert: {e}")))?;
        }

        info!(count = seeds.len(), "Seeded starter FAQs");
        Ok(seeds.len() as u64)
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let user_id: Option<String> = row
            .try_get("user_id")
            .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| StoreError::QueryFailed(format!("metadata column: {e}")))?;
        let is_active: i64 = row
            .try_get("is_active")
            .map_err(|e| StoreError::QueryFailed(format!("is_active column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::QueryFailed(format!("updated_at column: {e}")))?;

        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

        Ok(Session {
            id: SessionId(id),
            user_id,
            metadata,
            is_active: is_active != 0,
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let body: String = row
            .try_get("body")
            .map_err(|e| StoreError::QueryFailed(format!("body column: {e}")))?;
        let kind_str: String = row
            .try_get("kind")
            .map_err(|e| StoreError::QueryFailed(format!("kind column: {e}")))?;
        let confidence: Option<f32> = row
            .try_get("confidence")
            .map_err(|e| StoreError::QueryFailed(format!("confidence column: {e}")))?;
        let timestamp: String = row
            .try_get("timestamp")
            .map_err(|e| StoreError::QueryFailed(format!("timestamp column: {e}")))?;

        let role = match role_str.as_str() {
            "bot" => Role::Bot,
            _ => Role::User,
        };
        let kind = match kind_str.as_str() {
            "faq" => TurnKind::Faq,
            "escalation" => TurnKind::Escalation,
            "error" => TurnKind::Error,
            _ => TurnKind::Text,
        };

        Ok(Turn {
            id,
            session_id: SessionId(session_id),
            role,
            body,
            kind,
            confidence,
            timestamp: Self::parse_timestamp(&timestamp),
        })
    }

    fn row_to_faq(row: &sqlx::sqlite::SqliteRow) -> Result<FaqEntry, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let question: String = row
            .try_get("question")
            .map_err(|e| StoreError::QueryFailed(format!("question column: {e}")))?;
        let answer: String = row
            .try_get("answer")
            .map_err(|e| StoreError::QueryFailed(format!("answer column: {e}")))?;
        let keywords: String = row
            .try_get("keywords")
            .map_err(|e| StoreError::QueryFailed(format!("keywords column: {e}")))?;
        let category: String = row
            .try_get("category")
            .map_err(|e| StoreError::QueryFailed(format!("category column: {e}")))?;
        let priority: i32 = row
            .try_get("priority")
            .map_err(|e| StoreError::QueryFailed(format!("priority column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::QueryFailed(format!("updated_at column: {e}")))?;

        Ok(FaqEntry {
            id,
            question,
            answer,
            keywords,
            category,
            priority,
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn row_to_escalation(row: &sqlx::sqlite::SqliteRow) -> Result<Escalation, StoreError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let session_id: String = row
            .try_get("session_id")
            .map_err(|e| StoreError::QueryFailed(format!("session_id column: {e}")))?;
        let reason: String = row
            .try_get("reason")
            .map_err(|e| StoreError::QueryFailed(format!("reason column: {e}")))?;
        let status_str: String = row
            .try_get("status")
            .map_err(|e| StoreError::QueryFailed(format!("status column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let resolved_at: Option<String> = row
            .try_get("resolved_at")
            .map_err(|e| StoreError::QueryFailed(format!("resolved_at column: {e}")))?;
        let resolved_by: Option<String> = row
            .try_get("resolved_by")
            .map_err(|e| StoreError::QueryFailed(format!("resolved_by column: {e}")))?;

        Ok(Escalation {
            id,
            session_id: SessionId(session_id),
            reason,
            status: EscalationStatus::parse(&status_str).unwrap_or(EscalationStatus::Pending),
            created_at: Self::parse_timestamp(&created_at),
            resolved_at: resolved_at.as_deref().map(Self::parse_timestamp),
            resolved_by,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(
        &self,
        user_id: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Session, StoreError> {
        let mut session = Session::new(user_id);
        session.metadata = metadata;

        let metadata_json = serde_json::to_string(&session.metadata)
            .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, metadata, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            "#,
        )
        .bind(&session.id.0)
        .bind(&session.user_id)
        .bind(&metadata_json)
        .bind(session.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Session insert: {e}")))?;

        debug!(session_id = %session.id, "Created session");
        Ok(session)
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Session lookup: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        let result = match (patch.metadata, patch.is_active) {
            (Some(metadata), Some(is_active)) => {
                let json = serde_json::to_string(&metadata)
                    .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))?;
                sqlx::query(
                    "UPDATE sessions SET metadata = ?1, is_active = ?2, updated_at = ?3 WHERE id = ?4",
                )
                .bind(json)
                .bind(is_active as i64)
                .bind(&now)
                .bind(&id.0)
                .execute(&self.pool)
                .await
            }
            (Some(metadata), None) => {
                let json = serde_json::to_string(&metadata)
                    .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))?;
                sqlx::query("UPDATE sessions SET metadata = ?1, updated_at = ?2 WHERE id = ?3")
                    .bind(json)
                    .bind(&now)
                    .bind(&id.0)
                    .execute(&self.pool)
                    .await
            }
            (None, Some(is_active)) => {
                sqlx::query("UPDATE sessions SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
                    .bind(is_active as i64)
                    .bind(&now)
                    .bind(&id.0)
                    .execute(&self.pool)
                    .await
            }
            (None, None) => {
                sqlx::query("UPDATE sessions SET updated_at = ?1 WHERE id = ?2")
                    .bind(&now)
                    .bind(&id.0)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::Storage(format!("Session update: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound(id.0.clone()));
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sessions WHERE is_active = 1 ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Active sessions: {e}")))?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn end(&self, id: &SessionId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Session end: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SessionNotFound(id.0.clone()));
        }
        debug!(session_id = %id, "Ended session");
        Ok(())
    }
}

#[async_trait]
impl TurnStore for SqliteStore {
    async fn append(
        &self,
        session_id: &SessionId,
        body: &str,
        role: Role,
        kind: TurnKind,
        confidence: Option<f32>,
    ) -> Result<Turn, StoreError> {
        let id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO turns (id, session_id, role, body, kind, confidence, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(&session_id.0)
        .bind(role.as_str())
        .bind(body)
        .bind(kind.as_str())
        .bind(confidence)
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Turn insert: {e}")))?;

        Ok(Turn {
            id,
            session_id: session_id.clone(),
            role,
            body: body.to_string(),
            kind,
            confidence,
            timestamp,
        })
    }

    async fn recent_window(
        &self,
        session_id: &SessionId,
        n: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        // Newest n rows, then flipped back to chronological order.
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM turns WHERE session_id = ?1 ORDER BY iid DESC LIMIT ?2
            ) ORDER BY iid ASC
            "#,
        )
        .bind(&session_id.0)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Recent window: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn full_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM turns WHERE session_id = ?1 ORDER BY iid ASC LIMIT ?2",
        )
        .bind(&session_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Full history: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn summary_stats(&self, session_id: &SessionId) -> Result<TurnStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN role = 'user' THEN 1 ELSE 0 END) AS user_turns,
                SUM(CASE WHEN role = 'bot' THEN 1 ELSE 0 END) AS bot_turns,
                MIN(timestamp) AS first_at,
                MAX(timestamp) AS last_at
            FROM turns WHERE session_id = ?1
            "#,
        )
        .bind(&session_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Turn stats: {e}")))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::QueryFailed(format!("total column: {e}")))?;
        let user_turns: Option<i64> = row
            .try_get("user_turns")
            .map_err(|e| StoreError::QueryFailed(format!("user_turns column: {e}")))?;
        let bot_turns: Option<i64> = row
            .try_get("bot_turns")
            .map_err(|e| StoreError::QueryFailed(format!("bot_turns column: {e}")))?;
        let first_at: Option<String> = row.try_get("first_at").unwrap_or(None);
        let last_at: Option<String> = row.try_get("last_at").unwrap_or(None);

        Ok(TurnStats {
            total: total as u64,
            user_turns: user_turns.unwrap_or(0) as u64,
            bot_turns: bot_turns.unwrap_or(0) as u64,
            first_at: first_at.as_deref().map(Self::parse_timestamp),
            last_at: last_at.as_deref().map(Self::parse_timestamp),
        })
    }

    async fn delete_all(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM turns WHERE session_id = ?1")
            .bind(&session_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("Turn delete: {e}")))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FaqStore for SqliteStore {
    async fn query(
        &self,
        filter: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<FaqEntry>, StoreError> {
        let rows = match (filter, category) {
            (Some(filter), Some(category)) => {
                let like = format!("%{}%", filter.to_lowercase());
                sqlx::query(
                    r#"
                    SELECT * FROM faqs
                    WHERE category = ?1
                      AND (LOWER(question) LIKE ?2 OR LOWER(answer) LIKE ?2 OR LOWER(keywords) LIKE ?2)
                    ORDER BY priority DESC, id ASC LIMIT ?3
                    "#,
                )
                .bind(category)
                .bind(like)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            (Some(filter), None) => {
                let like = format!("%{}%", filter.to_lowercase());
                sqlx::query(
                    r#"
                    SELECT * FROM faqs
                    WHERE LOWER(question) LIKE ?1 OR LOWER(answer) LIKE ?1 OR LOWER(keywords) LIKE ?1
                    ORDER BY priority DESC, id ASC LIMIT ?2
                    "#,
                )
                .bind(like)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            (None, Some(category)) => {
                sqlx::query(
                    "SELECT * FROM faqs WHERE category = ?1 ORDER BY priority DESC, id ASC LIMIT ?2",
                )
                .bind(category)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                sqlx::query("SELECT * FROM faqs ORDER BY priority DESC, id ASC LIMIT ?1")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("FAQ query: {e}")))?;

        rows.iter().map(Self::row_to_faq).collect()
    }

    async fn create(&self, faq: NewFaq) -> Result<FaqEntry, StoreError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO faqs (question, answer, keywords, category, priority, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&faq.question)
        .bind(&faq.answer)
        .bind(&faq.keywords)
        .bind(&faq.category)
        .bind(faq.priority)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("FAQ insert: {e}")))?;

        Ok(FaqEntry {
            id: result.last_insert_rowid(),
            question: faq.question,
            answer: faq.answer,
            keywords: faq.keywords,
            category: faq.category,
            priority: faq.priority,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(&self, id: i64, patch: FaqPatch) -> Result<bool, StoreError> {
        let mut sets = Vec::new();
        if patch.question.is_some() {
            sets.push("question");
        }
        if patch.answer.is_some() {
            sets.push("answer");
        }
        if patch.keywords.is_some() {
            sets.push("keywords");
        }
        if patch.category.is_some() {
            sets.push("category");
        }
        if patch.priority.is_some() {
            sets.push("priority");
        }
        if sets.is_empty() {
            return Ok(false);
        }

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE faqs SET {}, updated_at = ?{} WHERE id = ?{}",
            assignments.join(", "),
            sets.len() + 1,
            sets.len() + 2,
        );

        let mut query = sqlx::query(&sql);
        if let Some(v) = &patch.question {
            query = query.bind(v);
        }
        if let Some(v) = &patch.answer {
            query = query.bind(v);
        }
        if let Some(v) = &patch.keywords {
            query = query.bind(v);
        }
        if let Some(v) = &patch.category {
            query = query.bind(v);
        }
        if let Some(v) = patch.priority {
            query = query.bind(v);
        }
        let result = query
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("FAQ update: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM faqs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("FAQ delete: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn categories(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS cnt FROM faqs GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("FAQ categories: {e}")))?;

        rows.iter()
            .map(|row| {
                let category: String = row
                    .try_get("category")
                    .map_err(|e| StoreError::QueryFailed(format!("category column: {e}")))?;
                let cnt: i64 = row
                    .try_get("cnt")
                    .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
                Ok((category, cnt as u64))
            })
            .collect()
    }
}

#[async_trait]
impl EscalationStore for SqliteStore {
    async fn create(
        &self,
        session_id: &SessionId,
        reason: &str,
    ) -> Result<Escalation, StoreError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO escalations (session_id, reason, status, created_at)
            VALUES (?1, ?2, 'pending', ?3)
            "#,
        )
        .bind(&session_id.0)
        .bind(reason)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Escalation insert: {e}")))?;

        let id = result.last_insert_rowid();
        info!(ticket_id = id, session_id = %session_id, "Created escalation ticket");

        Ok(Escalation {
            id,
            session_id: session_id.clone(),
            reason: reason.to_string(),
            status: EscalationStatus::Pending,
            created_at: now,
            resolved_at: None,
            resolved_by: None,
        })
    }

    async fn get(&self, id: i64) -> Result<Option<Escalation>, StoreError> {
        let row = sqlx::query("SELECT * FROM escalations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Escalation lookup: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_escalation(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Escalation>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM escalations WHERE session_id = ?1 ORDER BY id DESC",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Session escalations: {e}")))?;

        rows.iter().map(Self::row_to_escalation).collect()
    }

    async fn update_status(
        &self,
        id: i64,
        status: EscalationStatus,
        resolved_by: Option<&str>,
    ) -> Result<(), StoreError> {
        let current = self
            .get(id)
            .await?
            .ok_or(StoreError::EscalationNotFound(id))?;

        if !current.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        if status == EscalationStatus::Resolved {
            sqlx::query(
                "UPDATE escalations SET status = ?1, resolved_at = ?2, resolved_by = ?3 WHERE id = ?4",
            )
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(resolved_by)
            .bind(id)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query("UPDATE escalations SET status = ?1 WHERE id = ?2")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await
        }
        .map_err(|e| StoreError::Storage(format!("Escalation update: {e}")))?;

        debug!(ticket_id = id, status = %status, "Updated escalation status");
        Ok(())
    }

    async fn list_all(
        &self,
        status: Option<EscalationStatus>,
    ) -> Result<Vec<Escalation>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM escalations WHERE status = ?1 ORDER BY id DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM escalations ORDER BY id DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("Escalation list: {e}")))?;

        rows.iter().map(Self::row_to_escalation).collect()
    }

    async fn stats(&self, window_days: u32) -> Result<EscalationStats, StoreError> {
        let cutoff = (Utc::now() - Duration::days(window_days as i64)).to_rfc3339();

        let rows = sqlx::query("SELECT * FROM escalations WHERE created_at >= ?1")
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Escalation stats: {e}")))?;

        let escalations: Vec<Escalation> = rows
            .iter()
            .map(Self::row_to_escalation)
            .collect::<Result<_, _>>()?;

        let mut stats = EscalationStats {
            total: escalations.len() as u64,
            ..Default::default()
        };

        let mut resolution_days = Vec::new();
        for e in &escalations {
            match e.status {
                EscalationStatus::Pending => stats.pending += 1,
                EscalationStatus::InProgress => stats.in_progress += 1,
                EscalationStatus::Resolved => {
                    stats.resolved += 1;
                    if let Some(resolved_at) = e.resolved_at {
                        let elapsed = resolved_at - e.created_at;
                        resolution_days.push(elapsed.num_seconds() as f64 / 86_400.0);
                    }
                }
            }
        }

        if !resolution_days.is_empty() {
            stats.avg_resolution_days =
                Some(resolution_days.iter().sum::<f64>() / resolution_days.len() as f64);
        }

        Ok(stats)
    }
}

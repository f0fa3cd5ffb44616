//! End-to-end pipeline tests over the in-memory store and the
//! deterministic rule backend.

use async_trait::async_trait;
use deskclaw_backends::{RuleBackend, DEFAULT_CLARIFICATION};
use deskclaw_config::AppConfig;
use deskclaw_core::error::StoreError;
use deskclaw_core::escalation::{Escalation, EscalationStats, EscalationStatus};
use deskclaw_core::outcome::{OutcomeDetail, OutcomeKind};
use deskclaw_core::session::SessionId;
use deskclaw_core::store::{EscalationStore, SessionStore, TurnStore};
use deskclaw_core::turn::{Role, Turn, TurnKind, TurnStats};
use deskclaw_engine::Orchestrator;
use deskclaw_store::InMemoryStore;
use std::sync::Arc;

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.seed_faqs().await.unwrap();
    store
}

fn pipeline(store: &Arc<InMemoryStore>) -> Orchestrator {
    let config = AppConfig::default();
    Orchestrator::new(
        &config,
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(RuleBackend::new(&config.bot_name)),
    )
}

#[tokio::test]
async fn human_request_escalates() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot
        .process_message(None, "I want to talk to a human", None)
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Escalation);
    assert!((outcome.confidence - 0.9).abs() < f32::EPSILON);
    assert_eq!(outcome.source, "escalation_service");
    assert!(outcome.message.contains("Escalation Ticket: #1"));
    assert!(outcome.message.contains("2-5 minutes"));

    match outcome.detail {
        Some(OutcomeDetail::Escalation {
            ticket_id, reason, ..
        }) => {
            assert_eq!(ticket_id, 1);
            assert_eq!(reason, "Customer explicitly requested human assistance");
        }
        other => panic!("Expected escalation detail, got {other:?}"),
    }

    let pending = store
        .list_all(Some(EscalationStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn seeded_faq_answers_business_hours() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot
        .process_message(None, "What are your business hours?", None)
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Faq);
    assert!(outcome.confidence > 0.4);
    assert_eq!(outcome.source, "faq_database");
    assert!(outcome.message.contains("Monday to Friday"));
    assert!(outcome
        .message
        .ends_with("Is there anything else I can help you with regarding this topic?"));

    match outcome.detail {
        Some(OutcomeDetail::Faq { question, category }) => {
            assert_eq!(question, "What are your business hours?");
            assert_eq!(category, "general");
        }
        other => panic!("Expected FAQ detail, got {other:?}"),
    }
}

#[tokio::test]
async fn unmatched_message_gets_clarification_and_follow_up_turn() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot.process_message(None, "asdf zzz qqq", None).await;

    assert_eq!(outcome.kind, OutcomeKind::LlmResponse);
    assert!((outcome.confidence - 0.3).abs() < f32::EPSILON);
    assert_eq!(outcome.source, "rules");
    assert_eq!(outcome.message, DEFAULT_CLARIFICATION);

    // Low-confidence replies add a second bot turn with the offer to
    // connect a specialist.
    let history = store.full_history(&outcome.session_id, 20).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[2].body.contains("specialists"));
}

#[tokio::test]
async fn greeting_is_answered_confidently() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot.process_message(None, "hello", None).await;

    assert_eq!(outcome.kind, OutcomeKind::LlmResponse);
    assert!((outcome.confidence - 0.9).abs() < f32::EPSILON);
    assert!(outcome.message.contains("CustomerSupportBot"));

    // No clarification turn at high confidence.
    let history = store.full_history(&outcome.session_id, 20).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn repeated_question_escalates() {
    let store = seeded_store().await;
    let bot = pipeline(&store);
    let question = "What are your business hours?";

    let first = bot.process_message(None, question, None).await;
    assert_eq!(first.kind, OutcomeKind::Faq);
    let sid = first.session_id.clone();

    let second = bot.process_message(Some(&sid), question, None).await;
    assert_eq!(second.kind, OutcomeKind::Faq);

    let third = bot.process_message(Some(&sid), question, None).await;
    assert_eq!(third.kind, OutcomeKind::Escalation);
    match third.detail {
        Some(OutcomeDetail::Escalation { reason, .. }) => {
            assert!(reason.contains("repeating"));
        }
        other => panic!("Expected escalation detail, got {other:?}"),
    }
}

#[tokio::test]
async fn billing_question_escalates_before_faq() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    // This exact question exists in the FAQ set, but the escalation
    // check runs first and billing always escalates.
    let outcome = bot
        .process_message(None, "What payment methods do you accept?", None)
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Escalation);
    assert!(outcome.message.contains("billing support team"));
    match outcome.detail {
        Some(OutcomeDetail::Escalation { reason, .. }) => {
            assert_eq!(reason, "Billing/payment related inquiry");
        }
        other => panic!("Expected escalation detail, got {other:?}"),
    }
}

#[tokio::test]
async fn existing_session_is_reused() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let session = SessionStore::create(store.as_ref(), Some("user-9".into()), Default::default())
        .await
        .unwrap();

    let outcome = bot.process_message(Some(&session.id), "hello", None).await;
    assert_eq!(outcome.session_id, session.id);
}

#[tokio::test]
async fn unknown_session_id_starts_a_new_session() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let ghost = SessionId::new();
    let outcome = bot.process_message(Some(&ghost), "hello", None).await;

    assert_ne!(outcome.session_id, ghost);
    assert!(store.find(&outcome.session_id).await.unwrap().is_some());
}

#[tokio::test]
async fn session_summary_reports_escalated_status() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot
        .process_message(None, "let me speak to an agent", None)
        .await;
    assert_eq!(outcome.kind, OutcomeKind::Escalation);

    let summary = bot.session_summary(&outcome.session_id).await.unwrap();
    assert_eq!(summary.status, "escalated");
    assert_eq!(summary.escalations.len(), 1);
    assert_eq!(summary.message_stats.total, 2);
}

#[tokio::test]
async fn session_summary_without_escalations_is_active() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot.process_message(None, "hello", None).await;
    let summary = bot.session_summary(&outcome.session_id).await.unwrap();
    assert_eq!(summary.status, "active");
    assert!(summary.escalations.is_empty());
}

#[tokio::test]
async fn end_session_finalizes_and_clears_cache() {
    let store = seeded_store().await;
    let bot = pipeline(&store);

    let outcome = bot.process_message(None, "hello", None).await;
    let sid = outcome.session_id.clone();

    let end = bot.end_session(&sid).await.unwrap();
    assert_eq!(end.message_count, 2);
    assert!(end.summary.contains("customer messages"));

    let session = store.find(&sid).await.unwrap().unwrap();
    assert!(!session.is_active);
    assert_eq!(
        session.metadata["final_summary"],
        serde_json::json!(end.summary)
    );
    assert_eq!(session.metadata["total_messages"], serde_json::json!(2));
    assert!(session.metadata.contains_key("ended_at"));

    assert_eq!(bot.context_manager().cached_sessions().await, 0);
}

struct FailingEscalationStore;

#[async_trait]
impl EscalationStore for FailingEscalationStore {
    async fn create(&self, _: &SessionId, _: &str) -> Result<Escalation, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn get(&self, _: i64) -> Result<Option<Escalation>, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn list_by_session(&self, _: &SessionId) -> Result<Vec<Escalation>, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn update_status(
        &self,
        _: i64,
        _: EscalationStatus,
        _: Option<&str>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn list_all(
        &self,
        _: Option<EscalationStatus>,
    ) -> Result<Vec<Escalation>, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn stats(&self, _: u32) -> Result<EscalationStats, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }
}

struct EscalationTurnOutage {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl TurnStore for EscalationTurnOutage {
    async fn append(
        &self,
        session_id: &SessionId,
        body: &str,
        role: Role,
        kind: TurnKind,
        confidence: Option<f32>,
    ) -> Result<Turn, StoreError> {
        if kind == TurnKind::Escalation {
            return Err(StoreError::Storage("disk full".into()));
        }
        self.inner.append(session_id, body, role, kind, confidence).await
    }

    async fn recent_window(
        &self,
        session_id: &SessionId,
        n: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        self.inner.recent_window(session_id, n).await
    }

    async fn full_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        self.inner.full_history(session_id, limit).await
    }

    async fn summary_stats(&self, session_id: &SessionId) -> Result<TurnStats, StoreError> {
        self.inner.summary_stats(session_id).await
    }

    async fn delete_all(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        self.inner.delete_all(session_id).await
    }
}

#[tokio::test]
async fn unrecorded_escalation_turn_downgrades_to_fallback() {
    let store = seeded_store().await;
    let config = AppConfig::default();
    let bot = Orchestrator::new(
        &config,
        store.clone(),
        Arc::new(EscalationTurnOutage {
            inner: store.clone(),
        }),
        store.clone(),
        store.clone(),
        Arc::new(RuleBackend::new(&config.bot_name)),
    );

    let outcome = bot
        .process_message(None, "I want to talk to a human", None)
        .await;

    assert_eq!(outcome.kind, OutcomeKind::EscalationError);
    assert!((outcome.confidence - 0.5).abs() < f32::EPSILON);
    assert_eq!(outcome.source, "fallback");
    assert!(outcome.message.contains("support@company.com"));
    assert!(outcome.detail.is_none());

    // The ticket itself was created before the write failed.
    let pending = store
        .list_all(Some(EscalationStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn ticket_failure_falls_back_without_losing_the_customer() {
    let store = seeded_store().await;
    let config = AppConfig::default();
    let bot = Orchestrator::new(
        &config,
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(FailingEscalationStore),
        Arc::new(RuleBackend::new(&config.bot_name)),
    );

    let outcome = bot
        .process_message(None, "I want to talk to a human", None)
        .await;

    assert_eq!(outcome.kind, OutcomeKind::EscalationError);
    assert!((outcome.confidence - 0.5).abs() < f32::EPSILON);
    assert_eq!(outcome.source, "fallback");
    assert!(outcome.message.contains("support@company.com"));
    assert!(outcome.detail.is_none());
}

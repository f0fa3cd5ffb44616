//! In-memory store for tests and ephemeral deployments.
//!
//! Implements the same four traits as the SQLite store over plain
//! `RwLock`-guarded maps. Turn reads are counted so cache behavior can
//! be asserted in tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use deskclaw_core::error::StoreError;
use deskclaw_core::escalation::{Escalation, EscalationStats, EscalationStatus};
use deskclaw_core::faq::{FaqEntry, FaqPatch, NewFaq};
use deskclaw_core::session::{Session, SessionId, SessionPatch};
use deskclaw_core::store::{EscalationStore, FaqStore, SessionStore, TurnStore};
use deskclaw_core::turn::{Role, Turn, TurnKind, TurnStats};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    turns: HashMap<SessionId, Vec<Turn>>,
    faqs: Vec<FaqEntry>,
    next_faq_id: i64,
    escalations: Vec<Escalation>,
    next_escalation_id: i64,
}

/// An in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    turn_reads: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_faq_id: 1,
                next_escalation_id: 1,
                ..Default::default()
            }),
            turn_reads: AtomicU64::new(0),
        }
    }

    /// Number of turn-read calls served so far. Cache tests use this to
    /// verify that fresh context entries skip the store.
    pub fn turn_read_count(&self) -> u64 {
        self.turn_reads.load(Ordering::Relaxed)
    }

    /// Insert the same starter FAQ set the SQLite store seeds.
    pub async fn seed_faqs(&self) -> Result<u64, StoreError> {
        {
            let state = self.state.read().await;
            if !state.faqs.is_empty() {
                return Ok(0);
            }
        }

        let seeds = [
            NewFaq {
                question: "What are your business hours?".into(),
                answer: "Our business hours are Monday to Friday, 9 AM to 6 PM EST. We also \
                         offer 24/7 emergency support for critical issues."
                    .into(),
                keywords: "hours,time,available,when,open,closed".into(),
                category: "general".into(),
                priority: 1,
            },
            NewFaq {
                question: "How do I reset my password?".into(),
                answer: "To reset your password, click on the 'Forgot Password' link on the \
                         login page, enter your email address, and follow the instructions \
                         sent to your email."
                    .into(),
                keywords: "password,reset,forgot,login,access".into(),
                category: "account".into(),
                priority: 2,
            },
            NewFaq {
                question: "What payment methods do you accept?".into(),
                answer: "We accept all major credit cards (Visa, MasterCard, American \
                         Express), PayPal, and bank transfers for business accounts."
                    .into(),
                keywords: "payment,credit card,paypal,billing,pay".into(),
                category: "billing".into(),
                priority: 2,
            },
            NewFaq {
                question: "How can I cancel my subscription?".into(),
                answer: "You can cancel your subscription anytime from your account settings \
                         page. Go to Billing > Subscription > Cancel. Your access will \
                         continue until the end of your billing period."
                    .into(),
                keywords: "cancel,subscription,stop,end,terminate".into(),
                category: "billing".into(),
                priority: 1,
            },
            NewFaq {
                question: "Do you offer refunds?".into(),
                answer: "Yes, we offer a 30-day money-back guarantee for all new \
                         subscriptions. Contact our support team to process your refund."
                    .into(),
                keywords: "refund,money back,return,guarantee".into(),
                category: "billing".into(),
                priority: 2,
            },
        ];

        let count = seeds.len() as u64;
        for seed in seeds {
            FaqStore::create(self, seed).await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create(
        &self,
        user_id: Option<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Session, StoreError> {
        let mut session = Session::new(user_id);
        session.metadata = metadata;

        let mut state = self.state.write().await;
        state.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let state = self.state.read().await;
        Ok(state.sessions.get(id).cloned())
    }

    async fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.0.clone()))?;

        if let Some(metadata) = patch.metadata {
            session.metadata = metadata;
        }
        if let Some(is_active) = patch.is_active {
            session.is_active = is_active;
        }
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Session>, StoreError> {
        let state = self.state.read().await;
        let mut active: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(active)
    }

    async fn end(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let session = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.0.clone()))?;
        session.is_active = false;
        session.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TurnStore for InMemoryStore {
    async fn append(
        &self,
        session_id: &SessionId,
        body: &str,
        role: Role,
        kind: TurnKind,
        confidence: Option<f32>,
    ) -> Result<Turn, StoreError> {
        let turn = match role {
            Role::User => Turn::user(session_id, body),
            Role::Bot => Turn::bot(session_id, body, kind, confidence.unwrap_or(0.0)),
        };

        let mut state = self.state.write().await;
        state
            .turns
            .entry(session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(turn)
    }

    async fn recent_window(
        &self,
        session_id: &SessionId,
        n: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        self.turn_reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().await;
        let turns = state.turns.get(session_id).map(|t| t.as_slice()).unwrap_or(&[]);
        let start = turns.len().saturating_sub(n);
        Ok(turns[start..].to_vec())
    }

    async fn full_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        self.turn_reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().await;
        let turns = state.turns.get(session_id).map(|t| t.as_slice()).unwrap_or(&[]);
        Ok(turns.iter().take(limit).cloned().collect())
    }

    async fn summary_stats(&self, session_id: &SessionId) -> Result<TurnStats, StoreError> {
        let state = self.state.read().await;
        let turns = state.turns.get(session_id).map(|t| t.as_slice()).unwrap_or(&[]);

        Ok(TurnStats {
            total: turns.len() as u64,
            user_turns: turns.iter().filter(|t| t.role == Role::User).count() as u64,
            bot_turns: turns.iter().filter(|t| t.role == Role::Bot).count() as u64,
            first_at: turns.first().map(|t| t.timestamp),
            last_at: turns.last().map(|t| t.timestamp),
        })
    }

    async fn delete_all(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .turns
            .remove(session_id)
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl FaqStore for InMemoryStore {
    async fn query(
        &self,
        filter: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<FaqEntry>, StoreError> {
        let state = self.state.read().await;
        let needle = filter.map(|f| f.to_lowercase());

        let mut hits: Vec<FaqEntry> = state
            .faqs
            .iter()
            .filter(|faq| category.map_or(true, |c| faq.category == c))
            .filter(|faq| {
                needle.as_deref().map_or(true, |n| {
                    faq.question.to_lowercase().contains(n)
                        || faq.answer.to_lowercase().contains(n)
                        || faq.keywords.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();

        hits.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn create(&self, faq: NewFaq) -> Result<FaqEntry, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let entry = FaqEntry {
            id: state.next_faq_id,
            question: faq.question,
            answer: faq.answer,
            keywords: faq.keywords,
            category: faq.category,
            priority: faq.priority,
            created_at: now,
            updated_at: now,
        };
        state.next_faq_id += 1;
        state.faqs.push(entry.clone());
        Ok(entry)
    }

    async fn update(&self, id: i64, patch: FaqPatch) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(faq) = state.faqs.iter_mut().find(|f| f.id == id) else {
            return Ok(false);
        };

        if let Some(question) = patch.question {
            faq.question = question;
        }
        if let Some(answer) = patch.answer {
            faq.answer = answer;
        }
        if let Some(keywords) = patch.keywords {
            faq.keywords = keywords;
        }
        if let Some(category) = patch.category {
            faq.category = category;
        }
        if let Some(priority) = patch.priority {
            faq.priority = priority;
        }
        faq.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.faqs.len();
        state.faqs.retain(|f| f.id != id);
        Ok(state.faqs.len() < before)
    }

    async fn categories(&self) -> Result<Vec<(String, u64)>, StoreError> {
        let state = self.state.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for faq in &state.faqs {
            *counts.entry(faq.category.clone()).or_default() += 1;
        }
        let mut categories: Vec<(String, u64)> = counts.into_iter().collect();
        categories.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(categories)
    }
}

#[async_trait]
impl EscalationStore for InMemoryStore {
    async fn create(
        &self,
        session_id: &SessionId,
        reason: &str,
    ) -> Result<Escalation, StoreError> {
        let mut state = self.state.write().await;
        let escalation = Escalation {
            id: state.next_escalation_id,
            session_id: session_id.clone(),
            reason: reason.to_string(),
            status: EscalationStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        };
        state.next_escalation_id += 1;
        state.escalations.push(escalation.clone());
        Ok(escalation)
    }

    async fn get(&self, id: i64) -> Result<Option<Escalation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.escalations.iter().find(|e| e.id == id).cloned())
    }

    async fn list_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Escalation>, StoreError> {
        let state = self.state.read().await;
        let mut tickets: Vec<Escalation> = state
            .escalations
            .iter()
            .filter(|e| &e.session_id == session_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(tickets)
    }

    async fn update_status(
        &self,
        id: i64,
        status: EscalationStatus,
        resolved_by: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let escalation = state
            .escalations
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::EscalationNotFound(id))?;

        if !escalation.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: escalation.status.to_string(),
                to: status.to_string(),
            });
        }

        escalation.status = status;
        if status == EscalationStatus::Resolved {
            escalation.resolved_at = Some(Utc::now());
            escalation.resolved_by = resolved_by.map(String::from);
        }
        Ok(())
    }

    async fn list_all(
        &self,
        status: Option<EscalationStatus>,
    ) -> Result<Vec<Escalation>, StoreError> {
        let state = self.state.read().await;
        let mut tickets: Vec<Escalation> = state
            .escalations
            .iter()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(tickets)
    }

    async fn stats(&self, window_days: u32) -> Result<EscalationStats, StoreError> {
        let state = self.state.read().await;
        let cutoff = Utc::now() - Duration::days(window_days as i64);

        let mut stats = EscalationStats::default();
        let mut resolution_days = Vec::new();

        for e in state.escalations.iter().filter(|e| e.created_at >= cutoff) {
            stats.total += 1;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_lifecycle() {
        let store = InMemoryStore::new();
        let session = SessionStore::create(&store, Some("user-1".into()), Default::default())
            .await
            .unwrap();
        assert!(session.is_active);

        store.end(&session.id).await.unwrap();
        let found = store.find(&session.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn recent_window_takes_tail() {
        let store = InMemoryStore::new();
        let session = SessionStore::create(&store, None, Default::default())
            .await
            .unwrap();

        for i in 0..4 {
            store
                .append(
                    &session.id,
                    &format!("m{i}"),
                    Role::User,
                    TurnKind::Text,
                    None,
                )
                .await
                .unwrap();
        }

        let window = store.recent_window(&session.id, 2).await.unwrap();
        let bodies: Vec<&str> = window.iter().map(|t| t.body.as_str()).collect();
        assert_eq!(bodies, vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn turn_reads_are_counted() {
        let store = InMemoryStore::new();
        let session = SessionStore::create(&store, None, Default::default())
            .await
            .unwrap();

        assert_eq!(store.turn_read_count(), 0);
        store.recent_window(&session.id, 10).await.unwrap();
        store.full_history(&session.id, 10).await.unwrap();
        assert_eq!(store.turn_read_count(), 2);
    }

    #[tokio::test]
    async fn faq_query_orders_by_priority_then_id() {
        let store = InMemoryStore::new();
        store.seed_faqs().await.unwrap();

        let billing = FaqStore::query(&store, None, Some("billing"), 10)
            .await
            .unwrap();
        assert_eq!(billing.len(), 3);
        assert!(billing[0].priority >= billing[1].priority);
        assert!(billing[1].priority >= billing[2].priority);
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let store = InMemoryStore::new();
        assert_eq!(store.seed_faqs().await.unwrap(), 5);
        assert_eq!(store.seed_faqs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn escalation_transitions_forward_only() {
        let store = InMemoryStore::new();
        let session = SessionStore::create(&store, None, Default::default())
            .await
            .unwrap();
        let ticket = EscalationStore::create(&store, &session.id, "reason")
            .await
            .unwrap();

        store
            .update_status(ticket.id, EscalationStatus::Resolved, Some("agent"))
            .await
            .unwrap();
        let err = store
            .update_status(ticket.id, EscalationStatus::InProgress, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }
}

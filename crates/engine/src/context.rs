//! Conversation context manager.
//!
//! Builds a per-session view over the turn store (rolling window,
//! derived preferences, rule-based summary) and caches it with two
//! TTLs: a stale TTL after which the entry is rebuilt from the store,
//! and an idle TTL after which the sweep task evicts it. The cache is
//! an optimization only; every turn is persisted regardless.

use deskclaw_config::ContextConfig;
use deskclaw_core::error::StoreError;
use deskclaw_core::relevance;
use deskclaw_core::session::{SessionId, SessionPatch};
use deskclaw_core::store::{SessionStore, TurnStore};
use deskclaw_core::turn::{Role, Turn, TurnKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Relevance floor for pulling an old turn into the relevant set.
const RELEVANCE_FLOOR: f32 = 0.2;

/// Maximum turns returned by the relevance filter.
const RELEVANT_LIMIT: usize = 5;

/// How the customer writes. Informal only when informal markers strictly
/// outnumber formal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStyle {
    Formal,
    Informal,
}

/// Preferences derived from the customer's side of the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub preferred_language: String,
    pub communication_style: CommunicationStyle,
    pub topic_interests: Vec<String>,
    pub issue_categories: Vec<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            preferred_language: "en".into(),
            communication_style: CommunicationStyle::Formal,
            topic_interests: Vec::new(),
            issue_categories: Vec::new(),
        }
    }
}

/// The cached per-session view.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    /// Rolling window of recent turns, oldest first
    pub messages: Vec<Turn>,
    pub session_metadata: serde_json::Map<String, serde_json::Value>,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
    pub message_count: usize,
    pub user_preferences: UserPreferences,
    pub conversation_summary: String,
}

/// Query-side signals computed for one incoming message.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub is_follow_up: bool,
    pub related_to_recent: bool,
    pub user_style: CommunicationStyle,
    pub main_topics: Vec<String>,
}

/// A session context plus the turns relevant to the current query.
#[derive(Debug, Clone)]
pub struct RelevantContext {
    pub context: SessionContext,
    pub relevant: Vec<Turn>,
    pub query: QueryContext,
}

struct CacheEntry {
    context: SessionContext,
    /// When the entry was last rebuilt or patched by an append. Cache
    /// hits do not refresh it, so idle entries age out even while read.
    refreshed_at: Instant,
}

/// Context manager with an explicit TTL cache over the stores.
pub struct ContextManager {
    sessions: Arc<dyn SessionStore>,
    turns: Arc<dyn TurnStore>,
    config: ContextConfig,
    cache: RwLock<HashMap<SessionId, CacheEntry>>,
}

impl ContextManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        turns: Arc<dyn TurnStore>,
        config: ContextConfig,
    ) -> Self {
        Self {
            sessions,
            turns,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get the session context, served from cache while the entry is
    /// younger than the stale TTL, rebuilt from the store otherwise.
    pub async fn get_context(&self, session_id: &SessionId) -> Result<SessionContext, StoreError> {
        let now = Instant::now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(session_id) {
                if now.duration_since(entry.refreshed_at) < self.config.stale_ttl() {
                    return Ok(entry.context.clone());
                }
            }
        }

        let context = self.build_context(session_id).await?;

        let mut cache = self.cache.write().await;
        cache.insert(
            session_id.clone(),
            CacheEntry {
                context: context.clone(),
                refreshed_at: now,
            },
        );
        Ok(context)
    }

    async fn build_context(&self, session_id: &SessionId) -> Result<SessionContext, StoreError> {
        let messages = self
            .turns
            .recent_window(session_id, self.config.max_window)
            .await?;
        let session = self.sessions.find(session_id).await?;

        Ok(SessionContext {
            session_id: session_id.clone(),
            message_count: messages.len(),
            user_preferences: derive_preferences(&messages),
            conversation_summary: conversation_summary(&messages),
            session_metadata: session
                .as_ref()
                .map(|s| s.metadata.clone())
                .unwrap_or_default(),
            last_activity: session.map(|s| s.updated_at),
            messages,
        })
    }

    /// Context plus the turns relevant to `query` and the query-side
    /// signals the response stylist uses.
    pub async fn relevant_context(
        &self,
        session_id: &SessionId,
        query: &str,
    ) -> Result<RelevantContext, StoreError> {
        let context = self.get_context(session_id).await?;

        let mut scored: Vec<(f32, &Turn)> = context
            .messages
            .iter()
            .map(|turn| (relevance::score(query, &turn.body), turn))
            .filter(|(score, _)| *score > RELEVANCE_FLOOR)
            .collect();
        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let relevant: Vec<Turn> = scored
            .into_iter()
            .take(RELEVANT_LIMIT)
            .map(|(_, t)| t.clone())
            .collect();

        let query_context = QueryContext {
            is_follow_up: is_follow_up(query, &context.messages),
            related_to_recent: related_to_recent(query, &context.messages),
            user_style: context.user_preferences.communication_style,
            main_topics: context.user_preferences.topic_interests.clone(),
        };

        Ok(RelevantContext {
            context,
            relevant,
            query: query_context,
        })
    }

    /// Append a turn to the store, patch the cached window in place, and
    /// refresh the session's activity timestamp.
    pub async fn append_turn(
        &self,
        session_id: &SessionId,
        body: &str,
        role: Role,
        kind: TurnKind,
        confidence: Option<f32>,
    ) -> Result<Turn, StoreError> {
        let turn = self
            .turns
            .append(session_id, body, role, kind, confidence)
            .await?;

        {
            let mut cache = self.cache.write().await;
            if let Some(entry) = cache.get_mut(session_id) {
                entry.context.messages.push(turn.clone());
                let window = self.config.max_window;
                if entry.context.messages.len() > window {
                    let excess = entry.context.messages.len() - window;
                    entry.context.messages.drain(..excess);
                }
                entry.context.message_count += 1;
                entry.refreshed_at = Instant::now();
            }
        }

        self.sessions
            .update(session_id, SessionPatch::activity())
            .await?;
        Ok(turn)
    }

    /// Drop the cached entry for a session (used when a session ends).
    pub async fn invalidate(&self, session_id: &SessionId) {
        self.cache.write().await.remove(session_id);
    }

    /// Evict entries whose last rebuild or append is older than the
    /// idle TTL. Returns the number of evictions.
    pub async fn sweep(&self) -> usize {
        let idle_ttl = self.config.idle_ttl();
        let now = Instant::now();

        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| now.duration_since(entry.refreshed_at) <= idle_ttl);
        before - cache.len()
    }

    pub async fn cached_sessions(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Spawn the periodic sweep task.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.sweep_interval());
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = manager.sweep().await;
                if evicted > 0 {
                    debug!(evicted, "Evicted idle session contexts");
                }
            }
        })
    }
}

/// Derive communication style and topic interests from the customer's
/// turns in the window.
pub fn derive_preferences(messages: &[Turn]) -> UserPreferences {
    const INFORMAL: [&str; 7] = ["hey", "yeah", "nah", "gonna", "wanna", "cool", "awesome"];
    const FORMAL: [&str; 5] = [
        "please",
        "thank you",
        "could you",
        "would you",
        "i would like",
    ];
    const TOPICS: [(&str, &[&str]); 4] = [
        (
            "technical",
            &["api", "code", "programming", "development", "integration", "error"],
        ),
        (
            "billing",
            &["payment", "invoice", "subscription", "charge", "billing", "refund"],
        ),
        (
            "account",
            &["login", "password", "account", "profile", "settings", "access"],
        ),
        (
            "general",
            &["help", "support", "question", "information", "how to"],
        ),
    ];

    let user_texts: Vec<String> = messages
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.body.to_lowercase())
        .collect();

    let count_hits = |markers: &[&str]| -> usize {
        user_texts
            .iter()
            .map(|text| markers.iter().filter(|m| text.contains(*m)).count())
            .sum()
    };

    let informal = count_hits(&INFORMAL);
    let formal = count_hits(&FORMAL);

    let mut preferences = UserPreferences {
        communication_style: if informal > formal {
            CommunicationStyle::Informal
        } else {
            CommunicationStyle::Formal
        },
        ..Default::default()
    };

    for (topic, keywords) in TOPICS {
        if count_hits(keywords) > 0 {
            preferences.topic_interests.push(topic.to_string());
            preferences.issue_categories.push(topic.to_string());
        }
    }

    preferences
}

/// Rule-based conversation summary over the window.
pub fn conversation_summary(messages: &[Turn]) -> String {
    if messages.is_empty() {
        return "New conversation - no messages yet".into();
    }

    let user = messages.iter().filter(|t| t.role == Role::User).count();
    let bot = messages.len() - user;

    if user == 1 && bot <= 1 {
        return "Initial customer inquiry".into();
    }

    let topics = main_topics(messages);
    let topics_str = if topics.is_empty() {
        "general inquiry".into()
    } else {
        topics.join(", ")
    };

    if messages.len() > 8 {
        format!(
            "Extended conversation about {topics_str} - {user} customer messages, {bot} bot responses"
        )
    } else {
        format!("Discussion about {topics_str} - ongoing conversation")
    }
}

/// The up-to-three most mentioned topics in the window, by keyword
/// occurrence count.
pub fn main_topics(messages: &[Turn]) -> Vec<String> {
    const TOPICS: [(&str, &[&str]); 5] = [
        (
            "billing",
            &["payment", "invoice", "subscription", "charge", "billing", "refund", "credit card"],
        ),
        (
            "technical support",
            &["error", "bug", "not working", "broken", "issue", "problem", "api"],
        ),
        (
            "account management",
            &["login", "password", "account", "profile", "settings", "access"],
        ),
        (
            "product inquiry",
            &["features", "how to", "tutorial", "guide", "documentation"],
        ),
        (
            "service inquiry",
            &["hours", "contact", "support", "help", "assistance"],
        ),
    ];

    let all_text = messages
        .iter()
        .map(|t| t.body.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let mut counts: Vec<(&str, usize)> = TOPICS
        .iter()
        .map(|(topic, keywords)| {
            let count = keywords
                .iter()
                .map(|k| all_text.matches(k).count())
                .sum::<usize>();
            (*topic, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect();

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(3).map(|(t, _)| t.into()).collect()
}

/// A query is a follow-up when it carries a continuation marker and the
/// conversation is past its opening exchange.
fn is_follow_up(query: &str, messages: &[Turn]) -> bool {
    const INDICATORS: [&str; 6] = [
        "also",
        "and",
        "what about",
        "how about",
        "additionally",
        "furthermore",
    ];
    let lower = query.to_lowercase();
    INDICATORS.iter().any(|i| lower.contains(i)) && messages.len() > 2
}

/// Shared-token overlap between the query and the last three turns.
fn related_to_recent(query: &str, messages: &[Turn]) -> bool {
    let start = messages.len().saturating_sub(3);
    let recent = &messages[start..];
    if recent.is_empty() {
        return false;
    }

    let query_tokens = relevance::tokens(query);
    if query_tokens.is_empty() {
        return false;
    }

    let recent_text = recent
        .iter()
        .map(|t| t.body.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let common = query_tokens
        .iter()
        .filter(|t| recent_text.contains(t.as_str()))
        .count();

    common as f32 / query_tokens.len() as f32 > 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskclaw_core::session::SessionId;

    fn user_turns(bodies: &[&str]) -> Vec<Turn> {
        let sid = SessionId::new();
        bodies.iter().map(|b| Turn::user(&sid, *b)).collect()
    }

    fn exchange(sid: &SessionId, rounds: &[(&str, &str)]) -> Vec<Turn> {
        let mut turns = Vec::new();
        for (q, a) in rounds {
            turns.push(Turn::user(sid, *q));
            turns.push(Turn::bot(sid, *a, TurnKind::Text, 0.9));
        }
        turns
    }

    #[test]
    fn empty_window_summary() {
        assert_eq!(conversation_summary(&[]), "New conversation - no messages yet");
    }

    #[test]
    fn opening_exchange_summary() {
        let sid = SessionId::new();
        let turns = exchange(&sid, &[("hello there", "hi, how can I help?")]);
        assert_eq!(conversation_summary(&turns), "Initial customer inquiry");
    }

    #[test]
    fn ongoing_summary_names_topics() {
        let sid = SessionId::new();
        let turns = exchange(
            &sid,
            &[
                ("I forgot my password", "Use the reset link."),
                ("my login still fails", "Let me check your account."),
            ],
        );
        let summary = conversation_summary(&turns);
        assert!(summary.starts_with("Discussion about"));
        assert!(summary.contains("account management"));
    }

    #[test]
    fn extended_summary_counts_roles() {
        let sid = SessionId::new();
        let turns = exchange(
            &sid,
            &[
                ("my payment failed", "Checking the charge."),
                ("the invoice looks wrong", "One moment."),
                ("was the subscription renewed", "Yes, last week."),
                ("can I get a refund", "I can start that."),
                ("thanks for the billing help", "You're welcome."),
            ],
        );
        let summary = conversation_summary(&turns);
        assert!(summary.starts_with("Extended conversation about billing"));
        assert!(summary.contains("5 customer messages"));
        assert!(summary.contains("5 bot responses"));
    }

    #[test]
    fn preferences_default_to_formal() {
        let prefs = derive_preferences(&user_turns(&["where is the export button"]));
        assert_eq!(prefs.communication_style, CommunicationStyle::Formal);
        assert_eq!(prefs.preferred_language, "en");
    }

    #[test]
    fn informal_markers_flip_the_style() {
        let prefs = derive_preferences(&user_turns(&[
            "hey, this is awesome",
            "yeah cool, gonna try that",
        ]));
        assert_eq!(prefs.communication_style, CommunicationStyle::Informal);
    }

    #[test]
    fn formal_markers_keep_formal_on_tie() {
        // One informal and one formal marker: ties stay formal.
        let prefs = derive_preferences(&user_turns(&["hey, could you help me"]));
        assert_eq!(prefs.communication_style, CommunicationStyle::Formal);
    }

    #[test]
    fn topic_interests_collected_from_user_turns() {
        let prefs = derive_preferences(&user_turns(&[
            "the api integration throws an error",
            "also my invoice shows a double charge",
        ]));
        assert!(prefs.topic_interests.contains(&"technical".to_string()));
        assert!(prefs.topic_interests.contains(&"billing".to_string()));
        assert!(!prefs.topic_interests.contains(&"account".to_string()));
    }

    #[test]
    fn main_topics_ordered_by_frequency() {
        let turns = user_turns(&[
            "my payment failed and the invoice is wrong",
            "the refund never arrived, another billing problem",
            "also I cannot login",
        ]);
        let topics = main_topics(&turns);
        assert_eq!(topics.first().map(String::as_str), Some("billing"));
        assert!(topics.len() <= 3);
    }

    #[test]
    fn follow_up_requires_history() {
        let sid = SessionId::new();
        let short = exchange(&sid, &[("hello", "hi")]);
        assert!(!is_follow_up("what about weekends", &short));

        let longer = exchange(
            &sid,
            &[("hello", "hi"), ("what are your hours", "9 to 5")],
        );
        assert!(is_follow_up("what about weekends", &longer));
    }

    #[test]
    fn related_to_recent_checks_token_overlap() {
        let sid = SessionId::new();
        let turns = exchange(
            &sid,
            &[("my invoice total looks wrong", "Let me pull up the invoice.")],
        );
        assert!(related_to_recent("why is the invoice wrong", &turns));
        assert!(!related_to_recent("do you sell gift cards", &turns));
    }

    mod cache {
        use super::*;
        use deskclaw_store::InMemoryStore;

        async fn setup() -> (Arc<InMemoryStore>, Arc<ContextManager>, SessionId) {
            let store = Arc::new(InMemoryStore::new());
            let manager = Arc::new(ContextManager::new(
                store.clone(),
                store.clone(),
                ContextConfig::default(),
            ));
            let session = SessionStore::create(store.as_ref(), None, Default::default())
                .await
                .unwrap();
            (store, manager, session.id)
        }

        #[tokio::test(start_paused = true)]
        async fn fresh_entry_skips_the_store() {
            let (store, manager, sid) = setup().await;

            manager.get_context(&sid).await.unwrap();
            assert_eq!(store.turn_read_count(), 1);

            manager.get_context(&sid).await.unwrap();
            assert_eq!(store.turn_read_count(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn stale_entry_is_rebuilt() {
            let (store, manager, sid) = setup().await;

            manager.get_context(&sid).await.unwrap();
            tokio::time::advance(std::time::Duration::from_secs(301)).await;
            manager.get_context(&sid).await.unwrap();
            assert_eq!(store.turn_read_count(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn append_patches_cached_window() {
            let (store, manager, sid) = setup().await;

            manager.get_context(&sid).await.unwrap();
            manager
                .append_turn(&sid, "hello", Role::User, TurnKind::Text, None)
                .await
                .unwrap();

            let context = manager.get_context(&sid).await.unwrap();
            assert_eq!(context.messages.len(), 1);
            assert_eq!(context.message_count, 1);
            // Served from the patched cache entry, no second window read.
            assert_eq!(store.turn_read_count(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn window_is_trimmed_in_cache() {
            let (_, manager, sid) = setup().await;

            manager.get_context(&sid).await.unwrap();
            for i in 0..12 {
                manager
                    .append_turn(&sid, &format!("m{i}"), Role::User, TurnKind::Text, None)
                    .await
                    .unwrap();
            }

            let context = manager.get_context(&sid).await.unwrap();
            assert_eq!(context.messages.len(), 10);
            assert_eq!(context.messages[0].body, "m2");
            assert_eq!(context.message_count, 12);
        }

        #[tokio::test(start_paused = true)]
        async fn append_without_cache_entry_still_persists() {
            let (store, manager, sid) = setup().await;

            // No cached entry yet; the durable write happens regardless.
            manager
                .append_turn(&sid, "hello", Role::User, TurnKind::Text, None)
                .await
                .unwrap();
            assert_eq!(manager.cached_sessions().await, 0);

            let stored = store.full_history(&sid, 10).await.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].body, "hello");

            // The next rebuild picks the turn up from the store.
            let context = manager.get_context(&sid).await.unwrap();
            assert_eq!(context.messages.len(), 1);
            assert_eq!(context.messages[0].body, "hello");
        }

        #[tokio::test(start_paused = true)]
        async fn sweep_evicts_idle_entries() {
            let (_, manager, sid) = setup().await;

            manager.get_context(&sid).await.unwrap();
            assert_eq!(manager.cached_sessions().await, 1);

            tokio::time::advance(std::time::Duration::from_secs(901)).await;
            assert_eq!(manager.sweep().await, 1);
            assert_eq!(manager.cached_sessions().await, 0);
        }

        #[tokio::test(start_paused = true)]
        async fn cache_hits_do_not_extend_entry_life() {
            let (_, manager, sid) = setup().await;

            manager.get_context(&sid).await.unwrap();

            // A fresh read inside the stale TTL is a cache hit.
            tokio::time::advance(std::time::Duration::from_secs(250)).await;
            manager.get_context(&sid).await.unwrap();

            // 950s after the rebuild the entry is idle, hit or not.
            tokio::time::advance(std::time::Duration::from_secs(700)).await;
            assert_eq!(manager.sweep().await, 1);
        }

        #[tokio::test(start_paused = true)]
        async fn invalidate_removes_entry() {
            let (_, manager, sid) = setup().await;
            manager.get_context(&sid).await.unwrap();
            manager.invalidate(&sid).await;
            assert_eq!(manager.cached_sessions().await, 0);
        }
    }
}

//! FAQ matching — coarse store candidates refined by lexical scoring.
//!
//! The store supplies substring candidates; the matcher ranks them in
//! two stages. Coarse tiers order the field (question match beats answer
//! match beats keyword match, stored priority beats both), then the
//! fine lexical score picks the winner. A match below half the
//! configured confidence threshold is treated as no match.

use deskclaw_core::error::StoreError;
use deskclaw_core::faq::FaqEntry;
use deskclaw_core::relevance;
use deskclaw_core::store::FaqStore;
use std::sync::Arc;
use tracing::debug;

/// Pool size handed to the fine scoring pass.
const CANDIDATE_POOL: usize = 10;

/// How many substring candidates to pull from the store per query. The
/// store orders by priority and id only, so the cut to the requested
/// limit must happen after the tiers are applied, not before.
const CANDIDATE_SCAN: usize = 100;

/// A matched FAQ entry with its fine-grained confidence.
#[derive(Debug, Clone)]
pub struct FaqMatch {
    pub entry: FaqEntry,
    pub confidence: f32,
}

/// Two-stage FAQ matcher over a [`FaqStore`].
pub struct FaqMatcher {
    store: Arc<dyn FaqStore>,
    confidence_threshold: f32,
}

impl FaqMatcher {
    pub fn new(store: Arc<dyn FaqStore>, confidence_threshold: f32) -> Self {
        Self {
            store,
            confidence_threshold,
        }
    }

    /// Coarse field tier for one entry against the full query string.
    /// Zero means the store candidate slipped through without a real
    /// substring hit; such entries are dropped.
    fn tier(query_lower: &str, entry: &FaqEntry) -> u8 {
        if entry.question.to_lowercase().contains(query_lower) {
            10
        } else if entry.answer.to_lowercase().contains(query_lower) {
            8
        } else if entry.keywords.to_lowercase().contains(query_lower) {
            6
        } else {
            0
        }
    }

    async fn ranked_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(FaqEntry, u8)>, StoreError> {
        let scan = CANDIDATE_SCAN.max(limit);
        let candidates = self.store.query(Some(query), None, scan).await?;
        let query_lower = query.to_lowercase();

        let mut ranked: Vec<(FaqEntry, u8)> = candidates
            .into_iter()
            .map(|entry| {
                let tier = Self::tier(&query_lower, &entry);
                (entry, tier)
            })
            .filter(|(_, tier)| *tier > 0)
            .collect();

        ranked.sort_by(|(a, ta), (b, tb)| {
            b.priority
                .cmp(&a.priority)
                .then(tb.cmp(ta))
                .then(a.id.cmp(&b.id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Substring search, coarse ranking only.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<FaqEntry>, StoreError> {
        Ok(self
            .ranked_candidates(query, limit)
            .await?
            .into_iter()
            .map(|(entry, _)| entry)
            .collect())
    }

    /// Find the single best match for a customer message, or `None` when
    /// nothing clears the floor (half the confidence threshold).
    pub async fn best_match(&self, query: &str) -> Result<Option<FaqMatch>, StoreError> {
        let ranked = self.ranked_candidates(query, CANDIDATE_POOL).await?;
        if ranked.is_empty() {
            return Ok(None);
        }

        let mut scored: Vec<(FaqEntry, u8, f32)> = ranked
            .into_iter()
            .map(|(entry, tier)| {
                let haystack = format!("{} {}", entry.question, entry.keywords);
                let score = relevance::score(query, &haystack);
                (entry, tier, score)
            })
            .collect();

        // Fine score first, coarse tier as the tie-break.
        scored.sort_by(|(_, ta, sa), (_, tb, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(tb.cmp(ta))
        });

        let (entry, _, confidence) = scored.remove(0);
        let floor = self.confidence_threshold * 0.5;

        if confidence >= floor {
            debug!(faq_id = entry.id, confidence, "FAQ match");
            Ok(Some(FaqMatch { entry, confidence }))
        } else {
            debug!(confidence, floor, "Best FAQ candidate below floor");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use deskclaw_core::faq::{FaqPatch, NewFaq};
    use tokio::sync::Mutex;

    struct FixtureFaqStore {
        entries: Vec<FaqEntry>,
        queries: Mutex<Vec<String>>,
    }

    impl FixtureFaqStore {
        fn new(entries: Vec<FaqEntry>) -> Self {
            Self {
                entries,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl FaqStore for FixtureFaqStore {
        async fn query(
            &self,
            filter: Option<&str>,
            _category: Option<&str>,
            limit: usize,
        ) -> Result<Vec<FaqEntry>, StoreError> {
            if let Some(filter) = filter {
                self.queries.lock().await.push(filter.to_string());
            }
            let needle = filter.map(|f| f.to_lowercase());
            let mut hits: Vec<FaqEntry> = self
                .entries
                .iter()
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

        async fn create(&self, _faq: NewFaq) -> Result<FaqEntry, StoreError> {
            unimplemented!()
        }

        async fn update(&self, _id: i64, _patch: FaqPatch) -> Result<bool, StoreError> {
            unimplemented!()
        }

        async fn delete(&self, _id: i64) -> Result<bool, StoreError> {
            unimplemented!()
        }

        async fn categories(&self) -> Result<Vec<(String, u64)>, StoreError> {
            unimplemented!()
        }
    }

    fn entry(id: i64, question: &str, keywords: &str, priority: i32) -> FaqEntry {
        FaqEntry {
            id,
            question: question.into(),
            answer: format!("Answer for: {question}"),
            keywords: keywords.into(),
            category: "general".into(),
            priority,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn matcher(entries: Vec<FaqEntry>) -> FaqMatcher {
        FaqMatcher::new(Arc::new(FixtureFaqStore::new(entries)), 0.7)
    }

    #[tokio::test]
    async fn exact_question_matches() {
        let m = matcher(vec![
            entry(
                1,
                "What are your business hours?",
                "hours,time,open,closed",
                1,
            ),
            entry(2, "How do I reset my password?", "password,reset,login", 2),
        ]);

        let found = m
            .best_match("What are your business hours?")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.entry.id, 1);
        assert!(found.confidence > 0.4);
    }

    #[tokio::test]
    async fn keyword_only_query_matches() {
        let m = matcher(vec![entry(
            1,
            "How do I reset my password?",
            "password,reset,forgot,login,access",
            2,
        )]);

        let found = m.best_match("password").await.unwrap().unwrap();
        assert_eq!(found.entry.id, 1);
    }

    #[tokio::test]
    async fn unrelated_query_is_none() {
        let m = matcher(vec![entry(
            1,
            "What are your business hours?",
            "hours,time",
            1,
        )]);

        assert!(m.best_match("zzyx qwerty flurble").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn answer_only_hit_falls_below_floor() {
        // The candidate survives the substring stage via the answer
        // field, but the fine score only looks at question and keywords.
        let mut e = entry(1, "Billing cycle details", "cycle", 1);
        e.answer = "Your plan renews monthly with a grace period of three days.".into();
        let m = matcher(vec![e]);

        let result = m.best_match("grace period").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn priority_breaks_coarse_ties() {
        let m = matcher(vec![
            entry(1, "Shipping rates overview", "shipping,rates", 0),
            entry(2, "Shipping rates for business", "shipping,rates", 3),
        ]);

        let hits = m.search("shipping rates", 10).await.unwrap();
        assert_eq!(hits[0].id, 2);
    }

    #[tokio::test]
    async fn question_tier_survives_a_crowded_candidate_pool() {
        // Ten same-priority keyword-tier entries precede a question-tier
        // entry in store order; the tier cut must still surface it.
        let mut entries: Vec<FaqEntry> = (1..=10)
            .map(|i| entry(i, &format!("Question about widgets {i}"), "return policy", 0))
            .collect();
        entries.push(entry(11, "What is your return policy?", "refund,returns", 0));
        let m = matcher(entries);

        let hits = m.search("return policy", 10).await.unwrap();
        assert_eq!(hits[0].id, 11);

        let found = m.best_match("return policy").await.unwrap().unwrap();
        assert_eq!(found.entry.id, 11);
    }

    #[tokio::test]
    async fn search_truncates_to_limit() {
        let entries = (1..=8)
            .map(|i| entry(i, &format!("Question about widgets {i}"), "widgets", 0))
            .collect();
        let m = matcher(entries);

        let hits = m.search("widgets", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        // Insertion order is the final tie-break.
        assert_eq!(hits[0].id, 1);
    }
}

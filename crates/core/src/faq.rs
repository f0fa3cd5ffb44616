//! FAQ knowledge-base entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A curated question/answer pair in the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    /// Store-assigned ID (also the insertion-order tie-break)
    pub id: i64,

    pub question: String,

    pub answer: String,

    /// Comma-separated keyword list
    #[serde(default)]
    pub keywords: String,

    /// Category label (e.g. "billing", "technical")
    #[serde(default = "default_category")]
    pub category: String,

    /// Higher priority wins ties during matching
    #[serde(default)]
    pub priority: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_category() -> String {
    "general".into()
}

impl FaqEntry {
    /// Split the stored comma-separated keyword list into trimmed,
    /// lowercased tokens. Empty segments are dropped.
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Fields for creating a new FAQ entry (ID and timestamps are assigned
/// by the store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFaq {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub priority: i32,
}

/// A partial update to an existing FAQ entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaqPatch {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub keywords: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(keywords: &str) -> FaqEntry {
        FaqEntry {
            id: 1,
            question: "What are your business hours?".into(),
            answer: "We are open 9-5.".into(),
            keywords: keywords.into(),
            category: "general".into(),
            priority: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn keyword_list_trims_and_lowercases() {
        let faq = entry("Hours, Open , SCHEDULE");
        assert_eq!(faq.keyword_list(), vec!["hours", "open", "schedule"]);
    }

    #[test]
    fn keyword_list_drops_empty_segments() {
        let faq = entry("hours,, ,open");
        assert_eq!(faq.keyword_list(), vec!["hours", "open"]);
    }

    #[test]
    fn empty_keywords_yield_empty_list() {
        let faq = entry("");
        assert!(faq.keyword_list().is_empty());
    }
}

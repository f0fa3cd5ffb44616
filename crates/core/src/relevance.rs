//! Lexical relevance scoring.
//!
//! Matching is deliberately keyword-based: whitespace tokens, substring
//! containment, no stemming or embeddings. Both the FAQ matcher and the
//! context manager score with these functions, and the escalation
//! classifier uses the pairwise similarity for its repetition check.

/// Tokenize by whitespace, lowercase, and drop tokens of length <= 2.
///
/// The length filter means very short queries ("ok", "a b c") produce no
/// tokens and score 0 — a documented edge case, not an error.
pub fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Score how relevant `candidate` is to `query`, in [0,1].
///
/// Each query token contributes 1.0 if the candidate text contains it
/// verbatim, plus 0.5 for every candidate token that is a substring of,
/// or contains, the query token. The raw total is divided by the query
/// token count and capped at 1.
pub fn score(query: &str, candidate: &str) -> f32 {
    let query_tokens = tokens(query);
    if query_tokens.is_empty() {
        return 0.0;
    }

    let candidate_lower = candidate.to_lowercase();
    let candidate_tokens = tokens(candidate);

    let mut raw = 0.0_f32;
    for qt in &query_tokens {
        if candidate_lower.contains(qt.as_str()) {
            raw += 1.0;
        }
        for ct in &candidate_tokens {
            if ct.contains(qt.as_str()) || qt.contains(ct.as_str()) {
                raw += 0.5;
            }
        }
    }

    (raw / query_tokens.len() as f32).min(1.0)
}

/// Jaccard-like similarity between two texts, in [0,1]: shared tokens
/// over the larger token-set size. Used to detect customers repeating
/// the same question.
pub fn similarity(a: &str, b: &str) -> f32 {
    let tokens_a = tokens(a);
    let tokens_b = tokens(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let shared = tokens_a.iter().filter(|t| tokens_b.contains(t)).count();
    let larger = tokens_a.len().max(tokens_b.len());

    shared as f32 / larger as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_bounded() {
        let pairs = [
            ("reset my password", "How do I reset my password?"),
            ("billing", "completely unrelated text"),
            ("a much longer query about invoices and charges", "invoice"),
        ];
        for (q, c) in pairs {
            let s = score(q, c);
            assert!((0.0..=1.0).contains(&s), "score({q:?}, {c:?}) = {s}");
        }
    }

    #[test]
    fn self_score_beats_unrelated() {
        let text = "how do I update my payment method";
        assert!(score(text, text) >= score(text, "the weather is nice today"));
    }

    #[test]
    fn short_token_query_scores_zero() {
        // Every token is <= 2 chars, so nothing survives tokenization.
        assert_eq!(score("a to of", "a to of"), 0.0);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(score("", "anything"), 0.0);
        assert_eq!(score("anything", ""), 0.0);
    }

    #[test]
    fn verbatim_containment_scores_high() {
        let s = score("password", "reset your password here");
        assert!(s >= 1.0 - f32::EPSILON, "got {s}");
    }

    #[test]
    fn similarity_identical_texts() {
        let s = similarity("my invoice is wrong", "my invoice is wrong");
        assert!((s - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn similarity_disjoint_texts() {
        assert_eq!(similarity("billing invoice", "weather forecast"), 0.0);
    }

    #[test]
    fn similarity_uses_larger_set_size() {
        // "invoice wrong" shares 2 tokens with a 3-token set -> 2/3.
        let s = similarity("invoice wrong", "invoice wrong again");
        assert!((s - 2.0 / 3.0).abs() < 1e-6, "got {s}");
    }

    #[test]
    fn similarity_near_identical_variants_above_repetition_threshold() {
        let variants = [
            "my invoice is wrong",
            "the invoice is wrong again",
            "invoice still wrong",
        ];
        for a in &variants {
            for b in &variants {
                if a != b {
                    assert!(similarity(a, b) > 0.3, "{a:?} vs {b:?}");
                }
            }
        }
    }
}

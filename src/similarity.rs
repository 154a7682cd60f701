//! Similarity measures used by ranking, diversification and consolidation.
//!
//! - [`cosine_similarity`] compares embeddings.
//! - [`pattern_content_similarity`] compares pattern bodies by the Jaccard
//!   overlap of their lowercase word tokens.

use crate::types::PatternBody;
use crate::vector::Embedding;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

/// Cosine similarity between two embeddings.
///
/// 0.0 for mismatched dimensions or a zero-magnitude operand, never NaN.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> f32 {
    a.cosine_similarity(b)
}

/// Lowercase word tokens of a serialized pattern.
///
/// Serialized payloads are compact JSON, so tokens are runs of word
/// characters; quotes, braces and separators act as whitespace.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Jaccard similarity of two texts' token sets.
///
/// Two empty token sets score 0.0, so missing data never looks identical.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f32 / union as f32
}

/// Content similarity of two pattern bodies over their serialized form.
pub fn pattern_content_similarity(p1: &PatternBody, p2: &PatternBody) -> f32 {
    text_similarity(&p1.to_text(), &p2.to_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_bodies_score_one() {
        let p = PatternBody::Concrete(json!({"query": "index the query"}));
        assert_eq!(pattern_content_similarity(&p, &p.clone()), 1.0);
    }

    #[test]
    fn test_disjoint_bodies_score_zero() {
        let a = PatternBody::Concrete(json!(["alpha", "beta"]));
        let b = PatternBody::Concrete(json!(["gamma", "delta"]));
        assert_eq!(pattern_content_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_empty_bodies_score_zero() {
        let a = PatternBody::Concrete(json!({}));
        let b = PatternBody::Concrete(json!({}));
        assert_eq!(pattern_content_similarity(&a, &b), 0.0);
        assert_eq!(text_similarity("", ""), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {a, b, c} vs {b, c, d}: 2 shared of 4 total
        assert!((text_similarity("a b c", "B C d") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_symmetric() {
        let a = "cache the hot path";
        let b = "index the cold path";
        assert_eq!(text_similarity(a, b), text_similarity(b, a));
    }

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        let tokens = tokenize(r#"{"Query":"Add-Index"}"#);
        let expected: HashSet<String> = ["query", "add", "index"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_cosine_delegates() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }
}

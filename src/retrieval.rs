//! Ranking, diversification and context synthesis.
//!
//! These are the pure stages of a reasoning retrieval. The engine in
//! [`crate::core`] scans the store and drives them in order:
//!
//! 1. [`rank`] scores candidates by cosine similarity and sorts them.
//! 2. [`mmr_select`] or a plain truncation picks the top `k`.
//! 3. [`synthesize_context`] summarizes the selection.

use crate::similarity::pattern_content_similarity;
use crate::types::{Memory, PatternRecord};
use crate::vector::Embedding;
use std::cmp::Ordering;

/// Relevance weight of the MMR score.
pub const DEFAULT_MMR_LAMBDA: f32 = 0.7;

/// Maximal marginal relevance settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrConfig {
    /// Weight of query similarity; `1 - lambda` weighs diversity.
    pub lambda: f32,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_MMR_LAMBDA,
        }
    }
}

impl MmrConfig {
    /// MMR score of a candidate given its closest content match among the
    /// already selected items.
    pub fn score(&self, similarity: f32, min_similarity_to_selected: f32) -> f32 {
        self.lambda * similarity + (1.0 - self.lambda) * (1.0 - min_similarity_to_selected)
    }
}

/// Score records against a query and sort by descending similarity.
///
/// The sort is stable, so equal scores keep scan order.
pub fn rank(records: &[PatternRecord], query: &Embedding) -> Vec<Memory> {
    let mut scored: Vec<Memory> = records
        .iter()
        .map(|record| Memory::from_record(record, query.cosine_similarity(&record.embedding)))
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    scored
}

/// Pick `k` candidates balancing relevance against diversity.
///
/// `candidates` must already be sorted by descending similarity. The top
/// candidate is always selected first; each following pick maximizes
/// [`MmrConfig::score`], first candidate winning ties. When there are no
/// more than `k` candidates they are returned unchanged.
pub fn mmr_select(candidates: Vec<Memory>, k: usize, config: &MmrConfig) -> Vec<Memory> {
    if candidates.len() <= k {
        return candidates;
    }
    if k == 0 {
        return Vec::new();
    }

    let mut remaining = candidates;
    let mut selected = Vec::with_capacity(k);
    selected.push(remaining.remove(0));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_index = 0;

        for (index, candidate) in remaining.iter().enumerate() {
            let min_similarity = selected
                .iter()
                .map(|s: &Memory| pattern_content_similarity(&candidate.pattern, &s.pattern))
                .fold(f32::INFINITY, f32::min);

            let score = config.score(candidate.similarity, min_similarity);
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        selected.push(remaining.remove(best_index));
    }

    selected
}

/// Mean of `success_count / max(usage_count, 1)`, 0 for no memories.
pub fn mean_success_rate(memories: &[Memory]) -> f32 {
    if memories.is_empty() {
        return 0.0;
    }
    memories.iter().map(Memory::success_rate).sum::<f32>() / memories.len() as f32
}

/// Mean confidence, 0 for no memories.
pub fn mean_confidence(memories: &[Memory]) -> f32 {
    if memories.is_empty() {
        return 0.0;
    }
    memories.iter().map(|m| m.confidence).sum::<f32>() / memories.len() as f32
}

fn percent(value: f32) -> i64 {
    (value * 100.0).round() as i64
}

/// Natural-language summary of a selection.
///
/// `None` for an empty selection.
pub fn synthesize_context(memories: &[Memory], domain: Option<&str>) -> Option<String> {
    if memories.is_empty() {
        return None;
    }

    Some(format!(
        "Based on {} similar {}, the patterns show an {}% success rate with {}% average confidence. \
         Most effective approaches involve consistent methodology and iterative refinement.",
        memories.len(),
        domain.unwrap_or("experiences"),
        percent(mean_success_rate(memories)),
        percent(mean_confidence(memories)),
    ))
}

/// Memory optimizer: consolidation and pruning of stored patterns.
///
/// One pass works on a single scan of the (optionally domain-scoped)
/// pattern set:
///
/// - Consolidation: every pair whose embeddings are more similar than the
///   threshold marks the later pattern (by scan order) for deletion.
/// - Pruning: patterns that have been used often yet kept a low
///   confidence are marked for deletion.
///
/// Marks from both passes are deleted in one batch at the end.
///
/// ## Pass Order
///
/// Consolidation compares each pair once and always keeps the earlier
/// pattern. It is not transitive: in a chain `a ~ b ~ c` where `a` and `c`
/// are not similar, both `b` and `c` are removed, each against a different
/// survivor. A pattern already marked still takes part as the earlier item
/// of later pairs.
use crate::error::BankResult;
use crate::storage::PatternStore;
use crate::types::{OptimizationSummary, PatternRecord};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Cosine similarity above which two patterns are duplicates
    pub consolidation_threshold: f32,

    /// Patterns below this confidence are pruning candidates
    pub prune_confidence: f32,

    /// ...once their usage count exceeds this
    pub prune_min_usage: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            consolidation_threshold: 0.95,
            prune_confidence: 0.3,
            prune_min_usage: 10,
        }
    }
}

/// Outcome of planning one optimizer pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationPlan {
    /// Patterns considered
    pub scanned: usize,
    /// Duplicate pairs found
    pub consolidated: usize,
    /// Low-value patterns found
    pub pruned: usize,
    /// Unique ids to delete, in marking order
    pub to_remove: Vec<String>,
}

impl OptimizationPlan {
    /// Summary reported to callers.
    pub fn summary(&self) -> OptimizationSummary {
        let improved_quality = if self.scanned == 0 {
            0.0
        } else {
            (self.consolidated + self.pruned) as f32 / self.scanned as f32
        };

        OptimizationSummary {
            consolidated: self.consolidated,
            pruned: self.pruned,
            improved_quality,
        }
    }
}

/// Memory optimizer process.
pub struct MemoryOptimizer {
    config: OptimizerConfig,
    passes: AtomicU64,
    consolidated: AtomicU64,
    pruned: AtomicU64,
    removed: AtomicU64,
}

impl MemoryOptimizer {
    /// Create new optimizer.
    pub fn new() -> Self {
        Self::with_config(OptimizerConfig::default())
    }

    /// Create with custom config.
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self {
            config,
            passes: AtomicU64::new(0),
            consolidated: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Whether a pattern should be pruned.
    pub fn is_low_value(&self, record: &PatternRecord) -> bool {
        record.confidence < self.config.prune_confidence
            && record.usage_count > self.config.prune_min_usage
    }

    /// Decide what one pass would delete, without touching storage.
    ///
    /// `records` must be in scan order.
    pub fn plan(&self, records: &[PatternRecord]) -> OptimizationPlan {
        let mut plan = OptimizationPlan {
            scanned: records.len(),
            ..Default::default()
        };
        let mut marked = HashSet::new();

        for (i, earlier) in records.iter().enumerate() {
            for later in &records[i + 1..] {
                let similarity = earlier.embedding.cosine_similarity(&later.embedding);
                if similarity > self.config.consolidation_threshold {
                    plan.consolidated += 1;
                    if marked.insert(later.id.as_str()) {
                        plan.to_remove.push(later.id.clone());
                    }
                }
            }
        }

        for record in records {
            if self.is_low_value(record) {
                plan.pruned += 1;
                if marked.insert(record.id.as_str()) {
                    plan.to_remove.push(record.id.clone());
                }
            }
        }

        plan
    }

    /// Run one pass over `store`, optionally limited to `domain`.
    ///
    /// Callers must keep other writers out of the store for the duration.
    pub async fn run(
        &self,
        store: &PatternStore,
        domain: Option<&str>,
    ) -> BankResult<OptimizationSummary> {
        let records = store.scan(domain, f32::NEG_INFINITY).await?;
        let plan = self.plan(&records);

        let removed = if plan.to_remove.is_empty() {
            0
        } else {
            store.delete_many(&plan.to_remove).await?
        };

        self.passes.fetch_add(1, Ordering::Relaxed);
        self.consolidated
            .fetch_add(plan.consolidated as u64, Ordering::Relaxed);
        self.pruned.fetch_add(plan.pruned as u64, Ordering::Relaxed);
        self.removed.fetch_add(removed as u64, Ordering::Relaxed);

        let summary = plan.summary();
        if removed > 0 {
            info!(
                domain = domain.unwrap_or("*"),
                scanned = plan.scanned,
                consolidated = summary.consolidated,
                pruned = summary.pruned,
                removed,
                "Optimized pattern memory"
            );
        } else {
            debug!(domain = domain.unwrap_or("*"), scanned = plan.scanned, "Nothing to optimize");
        }

        Ok(summary)
    }

    /// Get statistics.
    pub fn stats(&self) -> OptimizerStats {
        OptimizerStats {
            passes: self.passes.load(Ordering::Relaxed),
            consolidated: self.consolidated.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Optimizer statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizerStats {
    pub passes: u64,
    pub consolidated: u64,
    pub pruned: u64,
    /// Patterns actually deleted
    pub removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternBody;
    use crate::vector::Embedding;
    use serde_json::json;

    fn record(id: &str, embedding: Vec<f32>) -> PatternRecord {
        PatternRecord::new("d", PatternBody::Concrete(json!({"id": id})), Embedding::new(embedding))
            .with_id(id)
            .with_confidence(0.9)
    }

    #[test]
    fn test_plan_consolidates_later_duplicate() {
        let optimizer = MemoryOptimizer::new();
        let records = vec![
            record("first", vec![1.0, 0.0]),
            record("second", vec![1.0, 0.01]),
            record("other", vec![0.0, 1.0]),
        ];

        let plan = optimizer.plan(&records);
        assert_eq!(plan.consolidated, 1);
        assert_eq!(plan.pruned, 0);
        assert_eq!(plan.to_remove, vec!["second"]);
    }

    #[test]
    fn test_plan_chain_is_pass_order_dependent() {
        // a ~ b and b ~ c, but a and c are further apart
        let angle = |deg: f32| {
            let r = deg.to_radians();
            vec![r.cos(), r.sin()]
        };
        let records = vec![record("a", angle(0.0)), record("b", angle(15.0)), record("c", angle(30.0))];
        let optimizer = MemoryOptimizer::with_config(OptimizerConfig {
            consolidation_threshold: 0.96,
            ..Default::default()
        });

        let plan = optimizer.plan(&records);
        assert_eq!(plan.consolidated, 2);
        assert_eq!(plan.to_remove, vec!["b", "c"]);
    }

    #[test]
    fn test_plan_counts_each_pair() {
        let records = vec![
            record("a", vec![1.0, 0.0]),
            record("b", vec![1.0, 0.0]),
            record("c", vec![1.0, 0.0]),
        ];
        let plan = MemoryOptimizer::new().plan(&records);

        // (a,b) (a,c) (b,c)
        assert_eq!(plan.consolidated, 3);
        assert_eq!(plan.to_remove, vec!["b", "c"]);
        assert!((plan.summary().improved_quality - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_plan_prunes_low_value() {
        let records = vec![
            record("weak", vec![1.0, 0.0]).with_confidence(0.2).with_usage(11, 0),
            record("fresh", vec![0.0, 1.0]).with_confidence(0.2).with_usage(10, 0),
            record("strong", vec![-1.0, 0.0]).with_usage(50, 45),
        ];
        let plan = MemoryOptimizer::new().plan(&records);
        assert_eq!(plan.pruned, 1);
        assert_eq!(plan.to_remove, vec!["weak"]);
    }

    #[test]
    fn test_plan_marked_by_both_passes_removed_once() {
        let records = vec![
            record("keep", vec![1.0, 0.0]),
            record("both", vec![1.0, 0.0]).with_confidence(0.1).with_usage(20, 1),
        ];
        let plan = MemoryOptimizer::new().plan(&records);
        assert_eq!(plan.consolidated, 1);
        assert_eq!(plan.pruned, 1);
        assert_eq!(plan.to_remove, vec!["both"]);
    }

    #[test]
    fn test_empty_plan_quality_is_zero() {
        let plan = MemoryOptimizer::new().plan(&[]);
        assert_eq!(plan.summary(), OptimizationSummary::default());
    }

    #[tokio::test]
    async fn test_run_deletes_and_counts() {
        let store = PatternStore::in_memory();
        store.insert(record("a", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("b", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("c", vec![0.0, 1.0])).await.unwrap();

        let optimizer = MemoryOptimizer::new();
        let summary = optimizer.run(&store, None).await.unwrap();
        assert_eq!(summary.consolidated, 1);
        assert_eq!(store.len().await.unwrap(), 2);

        let stats = optimizer.stats();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.removed, 1);
    }

    #[tokio::test]
    async fn test_run_respects_domain() {
        let store = PatternStore::in_memory();
        store.insert(record("a", vec![1.0, 0.0])).await.unwrap();
        let mut other = record("b", vec![1.0, 0.0]);
        other.domain = "elsewhere".to_string();
        store.insert(other).await.unwrap();

        let summary = MemoryOptimizer::new().run(&store, Some("d")).await.unwrap();
        assert_eq!(summary.consolidated, 0);
        assert_eq!(store.len().await.unwrap(), 2);
    }
}

/// Learning processes that maintain pattern memory.
///
/// - Consolidation: merging near-duplicates and pruning low-value patterns
/// - Judgment: classifying finished trajectories
/// - Distillation: turning judged trajectories into new patterns
pub mod consolidation;
pub mod distillation;
pub mod judgment;

pub use consolidation::{
    MemoryOptimizer, OptimizationPlan, OptimizerConfig, OptimizerStats,
};
pub use distillation::{DistillationConfig, DistillationPipeline, DistillationStats};
pub use judgment::{JudgeConfig, JudgeStats, TrajectoryJudge};

/// Process runner for the learning processes.
///
/// Owned by a [`crate::ReasoningBank`], which drives each process.
pub struct ProcessRunner {
    optimizer: MemoryOptimizer,
    judge: TrajectoryJudge,
    distillation: DistillationPipeline,
}

impl ProcessRunner {
    /// Create new process runner with default configs.
    pub fn new() -> Self {
        Self {
            optimizer: MemoryOptimizer::new(),
            judge: TrajectoryJudge::new(),
            distillation: DistillationPipeline::new(),
        }
    }

    /// Create with custom configurations.
    pub fn with_config(
        optimizer: OptimizerConfig,
        judge: JudgeConfig,
        distillation: DistillationConfig,
    ) -> Self {
        Self {
            optimizer: MemoryOptimizer::with_config(optimizer),
            judge: TrajectoryJudge::with_config(judge),
            distillation: DistillationPipeline::with_config(distillation),
        }
    }

    /// Get the memory optimizer.
    pub fn optimizer(&self) -> &MemoryOptimizer {
        &self.optimizer
    }

    /// Get the trajectory judge.
    pub fn judge(&self) -> &TrajectoryJudge {
        &self.judge
    }

    /// Get the distillation pipeline.
    pub fn distillation(&self) -> &DistillationPipeline {
        &self.distillation
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

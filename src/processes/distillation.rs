/// Distillation: turning judged trajectories into stored patterns.
///
/// ## The Algorithm
///
/// 1. Store the trajectory itself, with a confidence derived from its verdict.
/// 2. Retrieve the domain's memories closest to it, letting the retrieval
///    optimize memory and synthesize a context.
/// 3. With enough samples, store one `distilled-pattern` aggregating them.
/// 4. Return the retrieved memories the distillation was based on.
use crate::core::ReasoningBank;
use crate::error::BankResult;
use crate::retrieval::mean_success_rate;
use crate::types::{
    DistilledBody, Memory, PatternBody, PatternRecord, RetrievalOptions, Trajectory, Verdict,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Summary used when the retrieval produced no context.
pub const FALLBACK_SUMMARY: &str = "Pattern distilled from multiple experiences";

/// Distillation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DistillationConfig {
    /// Memories retrieved around the new trajectory
    pub retrieve_k: usize,

    /// Retrieved memories needed before a distilled pattern is written
    pub min_samples: usize,

    /// Confidence of distilled patterns
    pub distilled_confidence: f32,

    /// Trajectory confidence for a `success` verdict
    pub success_confidence: f32,

    /// Trajectory confidence for a `likely_success` verdict
    pub likely_success_confidence: f32,

    /// Trajectory confidence for every other verdict
    pub default_confidence: f32,
}

impl Default for DistillationConfig {
    fn default() -> Self {
        Self {
            retrieve_k: 100,
            min_samples: 5,
            distilled_confidence: 0.9,
            success_confidence: 0.95,
            likely_success_confidence: 0.8,
            default_confidence: 0.5,
        }
    }
}

/// Distillation pipeline process.
pub struct DistillationPipeline {
    config: DistillationConfig,
    trajectories_stored: AtomicU64,
    patterns_distilled: AtomicU64,
}

impl DistillationPipeline {
    /// Create new pipeline.
    pub fn new() -> Self {
        Self::with_config(DistillationConfig::default())
    }

    /// Create with custom config.
    pub fn with_config(config: DistillationConfig) -> Self {
        Self {
            config,
            trajectories_stored: AtomicU64::new(0),
            patterns_distilled: AtomicU64::new(0),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &DistillationConfig {
        &self.config
    }

    /// Confidence assigned to a trajectory judged `verdict`.
    pub fn trajectory_confidence(&self, verdict: Verdict) -> f32 {
        match verdict {
            Verdict::Success => self.config.success_confidence,
            Verdict::LikelySuccess => self.config.likely_success_confidence,
            Verdict::Failure | Verdict::NeedsReview => self.config.default_confidence,
        }
    }

    /// Distill a judged trajectory into `domain`, or its task when `None`.
    ///
    /// Returns the memories the distillation was based on, not the records
    /// it inserted.
    ///
    /// # Errors
    ///
    /// Propagates embedding and storage failures.
    pub async fn distill(
        &self,
        bank: &ReasoningBank,
        trajectory: &Trajectory,
        verdict: Verdict,
        domain: Option<&str>,
    ) -> BankResult<Vec<Memory>> {
        let domain = domain.unwrap_or(&trajectory.task).to_string();
        let embedding = bank.embed(&trajectory.to_text()).await?;

        let record = PatternRecord::new(
            domain.clone(),
            PatternBody::Trajectory(trajectory.clone()),
            embedding.clone(),
        )
        .with_confidence(self.trajectory_confidence(verdict))
        .with_usage(1, u32::from(verdict.is_positive()));
        let trajectory_id = bank.insert_pattern(record).await?;
        self.trajectories_stored.fetch_add(1, Ordering::Relaxed);

        let options = RetrievalOptions::new()
            .domain(domain.clone())
            .k(self.config.retrieve_k)
            .optimize_memory(true)
            .synthesize_context(true);
        let result = bank.retrieve_with_reasoning(&embedding, &options).await?;

        if result.memories.len() >= self.config.min_samples {
            let body = DistilledBody {
                domain: domain.clone(),
                pattern: result
                    .context
                    .clone()
                    .unwrap_or_else(|| FALLBACK_SUMMARY.to_string()),
                success_rate: mean_success_rate(&result.memories),
                sample_size: result.memories.len(),
            };
            let distilled =
                PatternRecord::new(domain.clone(), PatternBody::DistilledPattern(body), embedding)
                    .with_confidence(self.config.distilled_confidence);
            let distilled_id = bank.insert_pattern(distilled).await?;
            self.patterns_distilled.fetch_add(1, Ordering::Relaxed);

            info!(
                domain = %domain,
                samples = result.memories.len(),
                id = %distilled_id,
                "Distilled pattern"
            );
        } else {
            debug!(
                domain = %domain,
                samples = result.memories.len(),
                needed = self.config.min_samples,
                "Too few samples to distill"
            );
        }

        debug!(domain = %domain, id = %trajectory_id, verdict = %verdict, "Stored trajectory");
        Ok(result.memories)
    }

    /// Get statistics.
    pub fn stats(&self) -> DistillationStats {
        DistillationStats {
            trajectories_stored: self.trajectories_stored.load(Ordering::Relaxed),
            patterns_distilled: self.patterns_distilled.load(Ordering::Relaxed),
        }
    }
}

impl Default for DistillationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Distillation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistillationStats {
    pub trajectories_stored: u64,
    pub patterns_distilled: u64,
}

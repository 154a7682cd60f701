/// Trajectory judgment.
///
/// A finished trajectory is compared against similar, confidently stored
/// memories of the same task. The trajectory's own outcome decides first;
/// the number of similar successes only upgrades or downgrades within it:
///
/// | outcome   | similar successes       | verdict          |
/// |-----------|-------------------------|------------------|
/// | success   | >= success quorum       | `success`        |
/// | success   | fewer                   | `likely_success` |
/// | failure   | any                     | `failure`        |
/// | partial   | >= partial quorum       | `likely_success` |
/// | partial   | fewer                   | `needs_review`   |
use crate::core::ReasoningBank;
use crate::error::BankResult;
use crate::types::{Memory, Outcome, RetrievalOptions, Trajectory, Verdict};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Judge configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeConfig {
    /// Memories retrieved for comparison
    pub k: usize,

    /// Only memories at least this confident are compared
    pub min_confidence: f32,

    /// A memory counts when its similarity exceeds this
    pub similarity_threshold: f32,

    /// Similar successes needed to confirm a successful trajectory
    pub success_quorum: usize,

    /// Similar successes needed to lift a partial trajectory
    pub partial_quorum: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            k: 10,
            min_confidence: 0.7,
            similarity_threshold: 0.8,
            success_quorum: 5,
            partial_quorum: 3,
        }
    }
}

/// Trajectory judge process.
pub struct TrajectoryJudge {
    config: JudgeConfig,
    judged: AtomicU64,
    confirmed: AtomicU64,
    flagged: AtomicU64,
}

impl TrajectoryJudge {
    /// Create new judge.
    pub fn new() -> Self {
        Self::with_config(JudgeConfig::default())
    }

    /// Create with custom config.
    pub fn with_config(config: JudgeConfig) -> Self {
        Self {
            config,
            judged: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
            flagged: AtomicU64::new(0),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Number of memories that recorded a success and are similar enough.
    pub fn count_successful(&self, memories: &[Memory]) -> usize {
        memories
            .iter()
            .filter(|m| {
                m.pattern.outcome() == Some(Outcome::Success)
                    && m.similarity > self.config.similarity_threshold
            })
            .count()
    }

    /// Apply the verdict rule.
    pub fn verdict(&self, outcome: Outcome, successful: usize) -> Verdict {
        match outcome {
            Outcome::Success if successful >= self.config.success_quorum => Verdict::Success,
            Outcome::Success => Verdict::LikelySuccess,
            Outcome::Failure => Verdict::Failure,
            Outcome::Partial if successful >= self.config.partial_quorum => Verdict::LikelySuccess,
            Outcome::Partial => Verdict::NeedsReview,
        }
    }

    /// Judge a trajectory against the memories of its task.
    ///
    /// # Errors
    ///
    /// Propagates embedding and storage failures.
    pub async fn judge(&self, bank: &ReasoningBank, trajectory: &Trajectory) -> BankResult<Verdict> {
        let embedding = bank.embed(&trajectory.to_text()).await?;
        let options = RetrievalOptions::new()
            .domain(trajectory.task.clone())
            .k(self.config.k)
            .min_confidence(self.config.min_confidence);

        let result = bank.retrieve_with_reasoning(&embedding, &options).await?;
        let successful = self.count_successful(&result.memories);
        let verdict = self.verdict(trajectory.outcome, successful);

        self.judged.fetch_add(1, Ordering::Relaxed);
        match verdict {
            Verdict::Success => {
                self.confirmed.fetch_add(1, Ordering::Relaxed);
            }
            Verdict::NeedsReview => {
                self.flagged.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        debug!(
            task = %trajectory.task,
            outcome = %trajectory.outcome,
            compared = result.memories.len(),
            successful,
            verdict = %verdict,
            "Judged trajectory"
        );

        Ok(verdict)
    }

    /// Get statistics.
    pub fn stats(&self) -> JudgeStats {
        JudgeStats {
            judged: self.judged.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            flagged: self.flagged.load(Ordering::Relaxed),
        }
    }
}

impl Default for TrajectoryJudge {
    fn default() -> Self {
        Self::new()
    }
}

/// Judge statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JudgeStats {
    pub judged: u64,
    /// Verdicts of `success`
    pub confirmed: u64,
    /// Verdicts of `needs_review`
    pub flagged: u64,
}

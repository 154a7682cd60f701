/// Core data types for ReasoningBank.
///
/// Pattern records pair an embedding with a typed body. The body is an
/// adjacently tagged enum (`{"type": ..., "pattern": ...}`), so the
/// abstraction level and the payload can never disagree, and consumers
/// match on variants instead of poking at untyped JSON.
use crate::vector::Embedding;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Coarse tag of a stored pattern.
///
/// `Concrete`, `Pattern` and `Principle` are abstraction levels, low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternType {
    Experience,
    Trajectory,
    DistilledPattern,
    Concrete,
    Pattern,
    Principle,
}

impl PatternType {
    /// All pattern types, in declaration order.
    pub const ALL: [PatternType; 6] = [
        PatternType::Experience,
        PatternType::Trajectory,
        PatternType::DistilledPattern,
        PatternType::Concrete,
        PatternType::Pattern,
        PatternType::Principle,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Experience => "experience",
            PatternType::Trajectory => "trajectory",
            PatternType::DistilledPattern => "distilled-pattern",
            PatternType::Concrete => "concrete",
            PatternType::Pattern => "pattern",
            PatternType::Principle => "principle",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown pattern type '{}'", s))
    }
}

/// Final outcome of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
            Outcome::Partial => write!(f, "partial"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            "partial" => Ok(Outcome::Partial),
            other => Err(format!("unknown outcome '{}'", other)),
        }
    }
}

/// One step of a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: String,
    pub result: String,
}

/// A recorded task execution.
///
/// Steps are appended while the task runs; once the outcome is known the
/// trajectory is embedded and handed to judgment and distillation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Task identifier, also the default domain for judgment
    pub task: String,
    /// Ordered steps taken
    pub steps: Vec<Step>,
    /// Final outcome
    pub outcome: Outcome,
    /// Optional numeric metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
}

impl Trajectory {
    /// Create a trajectory with no steps yet.
    pub fn new(task: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            task: task.into(),
            steps: Vec::new(),
            outcome,
            metrics: None,
        }
    }

    /// Append a step.
    pub fn with_step(mut self, action: impl Into<String>, result: impl Into<String>) -> Self {
        self.steps.push(Step {
            action: action.into(),
            result: result.into(),
        });
        self
    }

    /// Record a metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value);
        self
    }

    /// Serialized form used as embedding input.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Body of an `experience` pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceBody {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl ExperienceBody {
    /// Create an experience with no approach or metrics.
    pub fn new(query: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            query: query.into(),
            approach: None,
            outcome,
            metrics: BTreeMap::new(),
        }
    }

    /// Set the approach taken.
    pub fn with_approach(mut self, approach: impl Into<String>) -> Self {
        self.approach = Some(approach.into());
        self
    }
}

/// Body of a `distilled-pattern`: the aggregate of many experiences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistilledBody {
    pub domain: String,
    /// Synthesized summary text
    pub pattern: String,
    pub success_rate: f32,
    pub sample_size: usize,
}

/// Typed pattern payload, one variant per [`PatternType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "pattern", rename_all = "kebab-case")]
pub enum PatternBody {
    Experience(ExperienceBody),
    Trajectory(Trajectory),
    DistilledPattern(DistilledBody),
    Concrete(JsonValue),
    Pattern(JsonValue),
    Principle(JsonValue),
}

impl PatternBody {
    /// Rebuild a body from its stored type tag and raw payload.
    pub fn from_parts(kind: PatternType, pattern: JsonValue) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "type": kind,
            "pattern": pattern,
        }))
    }

    /// The type tag of this body.
    pub fn pattern_type(&self) -> PatternType {
        match self {
            PatternBody::Experience(_) => PatternType::Experience,
            PatternBody::Trajectory(_) => PatternType::Trajectory,
            PatternBody::DistilledPattern(_) => PatternType::DistilledPattern,
            PatternBody::Concrete(_) => PatternType::Concrete,
            PatternBody::Pattern(_) => PatternType::Pattern,
            PatternBody::Principle(_) => PatternType::Principle,
        }
    }

    /// The payload without its type tag.
    pub fn content(&self) -> JsonValue {
        let value = match self {
            PatternBody::Experience(body) => serde_json::to_value(body),
            PatternBody::Trajectory(body) => serde_json::to_value(body),
            PatternBody::DistilledPattern(body) => serde_json::to_value(body),
            PatternBody::Concrete(v) | PatternBody::Pattern(v) | PatternBody::Principle(v) => {
                Ok(v.clone())
            }
        };
        value.unwrap_or(JsonValue::Null)
    }

    /// Serialized payload text, the input to content similarity.
    pub fn to_text(&self) -> String {
        self.content().to_string()
    }

    /// The recorded outcome, if this body carries one.
    ///
    /// Free-form bodies report an outcome when they hold an `"outcome"`
    /// string field naming one.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            PatternBody::Experience(body) => Some(body.outcome),
            PatternBody::Trajectory(t) => Some(t.outcome),
            PatternBody::DistilledPattern(_) => None,
            PatternBody::Concrete(v) | PatternBody::Pattern(v) | PatternBody::Principle(v) => v
                .get("outcome")
                .and_then(JsonValue::as_str)
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// A stored unit of memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    /// Unique id; assigned by the store when empty
    pub id: String,
    pub domain: String,
    pub body: PatternBody,
    pub embedding: Embedding,
    /// Caller-assigned confidence in [0, 1]
    pub confidence: f32,
    pub usage_count: u32,
    pub success_count: u32,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub last_used: i64,
}

impl PatternRecord {
    /// Create a record with confidence 0.5 and zero usage.
    pub fn new(domain: impl Into<String>, body: PatternBody, embedding: Embedding) -> Self {
        let now = now_millis();
        Self {
            id: String::new(),
            domain: domain.into(),
            body,
            embedding,
            confidence: 0.5,
            usage_count: 0,
            success_count: 0,
            created_at: now,
            last_used: now,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the confidence, clamped to [0, 1].
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set usage and success counters.
    pub fn with_usage(mut self, usage_count: u32, success_count: u32) -> Self {
        self.usage_count = usage_count;
        self.success_count = success_count;
        self
    }

    /// The type tag of the body.
    pub fn pattern_type(&self) -> PatternType {
        self.body.pattern_type()
    }
}

/// A retrieval result. Produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub domain: String,
    pub pattern: PatternBody,
    /// Cosine similarity to the query
    pub similarity: f32,
    pub confidence: f32,
    pub usage_count: u32,
    pub success_count: u32,
}

impl Memory {
    /// Build a memory from a record and its similarity score.
    pub fn from_record(record: &PatternRecord, similarity: f32) -> Self {
        Self {
            id: record.id.clone(),
            domain: record.domain.clone(),
            pattern: record.body.clone(),
            similarity,
            confidence: record.confidence,
            usage_count: record.usage_count,
            success_count: record.success_count,
        }
    }

    /// `success_count / max(usage_count, 1)`.
    pub fn success_rate(&self) -> f32 {
        self.success_count as f32 / self.usage_count.max(1) as f32
    }
}

/// Classification of a trajectory's success likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
    LikelySuccess,
    NeedsReview,
}

impl Verdict {
    /// Whether the verdict counts as a success for distillation.
    pub fn is_positive(&self) -> bool {
        matches!(self, Verdict::Success | Verdict::LikelySuccess)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => write!(f, "success"),
            Verdict::Failure => write!(f, "failure"),
            Verdict::LikelySuccess => write!(f, "likely_success"),
            Verdict::NeedsReview => write!(f, "needs_review"),
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Verdict::Success),
            "failure" => Ok(Verdict::Failure),
            "likely_success" => Ok(Verdict::LikelySuccess),
            "needs_review" => Ok(Verdict::NeedsReview),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

/// Options for [`crate::ReasoningBank::retrieve_with_reasoning`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Exact-match domain filter
    pub domain: Option<String>,
    /// Maximum number of results
    pub k: usize,
    /// Minimum confidence (inclusive)
    pub min_confidence: f32,
    /// Diversify with maximal marginal relevance
    pub use_mmr: bool,
    /// Produce a natural-language summary
    pub synthesize_context: bool,
    /// Run the optimizer as a side effect
    pub optimize_memory: bool,
}

impl RetrievalOptions {
    /// Defaults: no domain, k = 10, no confidence floor, all toggles off.
    pub fn new() -> Self {
        Self {
            domain: None,
            k: 10,
            min_confidence: 0.0,
            use_mmr: false,
            synthesize_context: false,
            optimize_memory: false,
        }
    }

    /// Filter by domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the result count.
    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the minimum confidence.
    pub fn min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = threshold;
        self
    }

    /// Enable MMR diversification.
    pub fn use_mmr(mut self, enabled: bool) -> Self {
        self.use_mmr = enabled;
        self
    }

    /// Enable context synthesis.
    pub fn synthesize_context(mut self, enabled: bool) -> Self {
        self.synthesize_context = enabled;
        self
    }

    /// Run the optimizer after ranking.
    pub fn optimize_memory(mut self, enabled: bool) -> Self {
        self.optimize_memory = enabled;
        self
    }
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters reported by one optimizer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    /// Near-duplicates removed
    pub consolidated: usize,
    /// Low-value patterns removed
    pub pruned: usize,
    /// `(consolidated + pruned) / scanned`, 0 for an empty scan
    pub improved_quality: f32,
}

/// Output of a reasoning retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub memories: Vec<Memory>,
    /// Present only when synthesis ran over at least one memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Bodies of `memories`, in the same order
    #[serde(default)]
    pub patterns: Vec<PatternBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizations: Option<OptimizationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pattern_type_round_trip_names() {
        for t in PatternType::ALL {
            assert_eq!(t.as_str().parse::<PatternType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
        }
        assert!("bogus".parse::<PatternType>().is_err());
    }

    #[test]
    fn test_body_from_parts() {
        let body = PatternBody::from_parts(
            PatternType::Experience,
            json!({"query": "q", "outcome": "success", "timestamp": 12}),
        )
        .unwrap();

        assert_eq!(body.pattern_type(), PatternType::Experience);
        assert_eq!(body.outcome(), Some(Outcome::Success));
    }

    #[test]
    fn test_body_from_parts_rejects_mismatched_payload() {
        let result = PatternBody::from_parts(PatternType::Trajectory, json!({"query": "q"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_freeform_body_outcome() {
        let body = PatternBody::Concrete(json!({"outcome": "failure", "note": "x"}));
        assert_eq!(body.outcome(), Some(Outcome::Failure));

        let body = PatternBody::Principle(json!("always index"));
        assert_eq!(body.outcome(), None);
    }

    #[test]
    fn test_body_content_strips_tag() {
        let body = PatternBody::Pattern(json!({"rule": "cache"}));
        assert_eq!(body.content(), json!({"rule": "cache"}));
        assert_eq!(body.to_text(), r#"{"rule":"cache"}"#);
    }

    #[test]
    fn test_trajectory_builder() {
        let t = Trajectory::new("optimize-api", Outcome::Success)
            .with_step("profile", "found N+1")
            .with_step("cache", "faster")
            .with_metric("latency_ms", 150.0);

        assert_eq!(t.steps.len(), 2);
        assert_eq!(t.metrics.as_ref().unwrap()["latency_ms"], 150.0);
        assert!(t.to_text().contains("\"outcome\":\"success\""));
    }

    #[test]
    fn test_memory_success_rate_guards_zero_usage() {
        let record = PatternRecord::new(
            "d",
            PatternBody::Concrete(json!({})),
            Embedding::new(vec![1.0]),
        )
        .with_usage(0, 0);
        let memory = Memory::from_record(&record, 1.0);
        assert_eq!(memory.success_rate(), 0.0);

        let record = record.with_usage(4, 3);
        assert!((Memory::from_record(&record, 1.0).success_rate() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_verdict_names() {
        assert_eq!(Verdict::LikelySuccess.to_string(), "likely_success");
        assert_eq!("needs_review".parse::<Verdict>().unwrap(), Verdict::NeedsReview);
        assert!(Verdict::Success.is_positive());
        assert!(!Verdict::NeedsReview.is_positive());
    }

    #[test]
    fn test_retrieval_options_defaults() {
        let opts = RetrievalOptions::default();
        assert_eq!(opts.k, 10);
        assert_eq!(opts.min_confidence, 0.0);
        assert!(!opts.use_mmr && !opts.synthesize_context && !opts.optimize_memory);
    }

    #[test]
    fn test_reasoning_result_omits_empty_context() {
        let result = ReasoningResult::default();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("context").is_none());
        assert!(json.get("optimizations").is_none());
    }
}

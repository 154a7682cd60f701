//! # ReasoningBank — Adaptive Pattern Memory
//!
//! ReasoningBank stores past task experiences keyed by vector embeddings
//! and gives them back when a similar task comes along:
//! - **Similarity retrieval** - Cosine ranking with domain and confidence filters
//! - **Diverse results** - Maximal marginal relevance instead of near-duplicates
//! - **Outcome judgment** - Classify finished trajectories against history
//! - **Self-maintenance** - Consolidate duplicates, prune unhelpful patterns
//!
//! ## Quick Start
//!
//! ```ignore
//! use reasoning_bank::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bank = ReasoningBank::open(BankConfig::in_memory()).await?;
//!
//!     // Log an experience
//!     let embedding = bank.embed("index the query").await?;
//!     let body = PatternBody::Experience(ExperienceBody::new("index the query", Outcome::Success));
//!     bank.insert_pattern(
//!         PatternRecord::new("db-opt", body, embedding.clone()).with_confidence(0.95),
//!     )
//!     .await?;
//!
//!     // Retrieve with reasoning
//!     let options = RetrievalOptions::new()
//!         .domain("db-opt")
//!         .k(5)
//!         .use_mmr(true)
//!         .synthesize_context(true);
//!     let result = bank.retrieve_with_reasoning(&embedding, &options).await?;
//!     println!("{:?}", result.context);
//!
//!     // Judge and distill a finished task
//!     let trajectory = Trajectory::new("db-opt", Outcome::Success)
//!         .with_step("add index", "query 40x faster");
//!     let verdict = bank.judge_trajectory(&trajectory).await?;
//!     bank.distill_memories(&trajectory, verdict, None).await?;
//!
//!     bank.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core API
//!
//! - [`ReasoningBank::open()`] - Open an engine from a [`BankConfig`]
//! - [`ReasoningBank::insert_pattern()`] - Store a pattern
//! - [`ReasoningBank::retrieve_with_reasoning()`] - Rank, diversify, summarize
//! - [`ReasoningBank::optimize()`] - Consolidate and prune
//! - [`ReasoningBank::close()`] - Flush and release
//!
//! Callers written against the function-style API use [`LegacyBank`].
//!
//! ## Architecture
//!
//! 1. **Engine** (`core`) - Lifecycle, locking, cache invalidation
//! 2. **Retrieval** (`retrieval`, `similarity`, `cache`) - Pure ranking stages
//! 3. **Processes** (`processes`) - Optimizer, judge, distillation
//! 4. **Storage** (`storage`, `persistence`) - In-memory or JSON snapshot backends
//!
//! ## Thread Safety
//!
//! `ReasoningBank` is cheap to clone and safe to share across tasks.
//! Optimization passes run exclusively; inserts and retrievals run
//! concurrently with each other.

// Internal modules
mod core;
mod error;

pub mod cache;
pub mod config;
pub mod legacy;
pub mod persistence;
pub mod processes;
pub mod retrieval;
pub mod similarity;
pub mod storage;
pub mod types;
pub mod vector;

// Public API exports
pub use config::{BankConfig, IN_MEMORY};
pub use crate::core::{BankStats, ReasoningBank};
pub use error::{BankError, BankResult};
pub use legacy::{LegacyBank, LegacyOptions};
pub use types::{
    DistilledBody, ExperienceBody, Memory, OptimizationSummary, Outcome, PatternBody,
    PatternRecord, PatternType, ReasoningResult, RetrievalOptions, Step, Trajectory, Verdict,
};
pub use vector::{Embedder, Embedding, HashEmbedder};

// Re-export commonly used external types for convenience
pub use serde_json::{Value as JsonValue, json};

/// Prelude module for convenient imports.
///
/// Import everything you need with:
/// ```ignore
/// use reasoning_bank::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::BankConfig;
    pub use crate::core::{BankStats, ReasoningBank};
    pub use crate::error::{BankError, BankResult};
    pub use crate::legacy::{LegacyBank, LegacyOptions};
    pub use crate::types::{
        DistilledBody, ExperienceBody, Memory, OptimizationSummary, Outcome, PatternBody,
        PatternRecord, PatternType, ReasoningResult, RetrievalOptions, Trajectory, Verdict,
    };
    pub use crate::vector::{Embedder, Embedding, HashEmbedder};
    pub use serde_json::{Value as JsonValue, json};
}

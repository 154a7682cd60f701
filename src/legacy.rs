//! Legacy retrieve / judge / distill surface.
//!
//! Callers written against the older function-style API hold a
//! [`LegacyBank`] handle (typically in an `Arc`) and pass it to every call
//! site. The handle owns at most one engine. It is built on first use,
//! reused afterwards, and torn down by [`LegacyBank::close_adapter`]; the
//! next call builds a fresh one. Construction happens under an async
//! mutex, so concurrent first calls share a single engine.

use crate::config::BankConfig;
use crate::core::ReasoningBank;
use crate::error::BankResult;
use crate::types::{Memory, RetrievalOptions, Trajectory, Verdict};
use crate::vector::Embedder;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Default result count of [`LegacyBank::retrieve_memories`].
pub const DEFAULT_LIMIT: usize = 10;

/// Options accepted by the legacy calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyOptions {
    /// Domain filter for retrieval, storage domain for distillation
    pub domain: Option<String>,
    /// Calling agent, recorded in logs
    pub agent: Option<String>,
    /// Maximum results, default 10
    pub limit: Option<usize>,
}

impl LegacyOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the domain.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the calling agent.
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Set the result limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Handle to a lazily built engine.
pub struct LegacyBank {
    config: BankConfig,
    embedder: Option<Arc<dyn Embedder>>,
    engine: Mutex<Option<ReasoningBank>>,
}

impl std::fmt::Debug for LegacyBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyBank")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LegacyBank {
    /// Create a handle that builds its engine from `config` on first use.
    pub fn new(config: BankConfig) -> Self {
        Self {
            config,
            embedder: None,
            engine: Mutex::new(None),
        }
    }

    /// Use a custom embedding provider for every engine this handle builds.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// The configuration engines are built from.
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Whether an engine is currently live.
    pub async fn is_initialized(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// The live engine, building it first if needed.
    pub async fn engine(&self) -> BankResult<ReasoningBank> {
        let mut slot = self.engine.lock().await;
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }

        let engine = match &self.embedder {
            Some(embedder) => {
                ReasoningBank::open_with_embedder(self.config.clone(), Arc::clone(embedder)).await?
            }
            None => ReasoningBank::open(self.config.clone()).await?,
        };
        debug!(location = %self.config.backend_location, "Initialized legacy engine");
        *slot = Some(engine.clone());
        Ok(engine)
    }

    /// Memories relevant to `query`, diversified with MMR.
    pub async fn retrieve_memories(
        &self,
        query: &str,
        options: &LegacyOptions,
    ) -> BankResult<Vec<Memory>> {
        let engine = self.engine().await?;
        let embedding = engine.embed(query).await?;

        let mut retrieval = RetrievalOptions::new()
            .k(options.limit.filter(|&limit| limit > 0).unwrap_or(DEFAULT_LIMIT))
            .use_mmr(true);
        retrieval.domain = options.domain.clone();

        let result = engine.retrieve_with_reasoning(&embedding, &retrieval).await?;
        debug!(
            agent = options.agent.as_deref().unwrap_or("-"),
            returned = result.memories.len(),
            "Legacy retrieval"
        );
        Ok(result.memories)
    }

    /// Judge a trajectory. `query` is the request that produced it; it is
    /// logged but does not influence the verdict.
    pub async fn judge_trajectory(&self, trajectory: &Trajectory, query: &str) -> BankResult<Verdict> {
        let engine = self.engine().await?;
        debug!(task = %trajectory.task, query, "Legacy judgment");
        engine.judge_trajectory(trajectory).await
    }

    /// Store a judged trajectory under `options.domain` (or its task) and
    /// distill that domain. Returns the memories the distillation used.
    pub async fn distill_memories(
        &self,
        trajectory: &Trajectory,
        verdict: Verdict,
        query: &str,
        options: &LegacyOptions,
    ) -> BankResult<Vec<Memory>> {
        let engine = self.engine().await?;
        debug!(task = %trajectory.task, query, verdict = %verdict, "Legacy distillation");
        engine
            .distill_memories(trajectory, verdict, options.domain.as_deref())
            .await
    }

    /// Close the live engine, if any. The next call builds a new one.
    pub async fn close_adapter(&self) -> BankResult<()> {
        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            engine.close().await?;
            debug!("Closed legacy engine");
        }
        Ok(())
    }
}

impl Default for LegacyBank {
    /// Default configuration: `.reasoningbank/bank.json`, learning and
    /// reasoning on, cache of 1000.
    fn default() -> Self {
        Self::new(BankConfig::default())
    }
}

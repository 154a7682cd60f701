/// Core ReasoningBank engine.
///
/// This module provides the engine handle that ties the store, the
/// embedder, the ranking cache and the learning processes together. It is
/// designed to be simple to use while doing the bookkeeping internally:
/// cache invalidation, maintenance locking and lifecycle checks.
///
/// # Example
///
/// ```ignore
/// let bank = ReasoningBank::open(BankConfig::in_memory()).await?;
///
/// let embedding = bank.embed("index the query").await?;
/// let body = PatternBody::Experience(ExperienceBody::new("index the query", Outcome::Success));
/// bank.insert_pattern(PatternRecord::new("db-opt", body, embedding.clone()).with_confidence(0.95)).await?;
///
/// let result = bank
///     .retrieve_with_reasoning(&embedding, &RetrievalOptions::new().domain("db-opt").k(5))
///     .await?;
/// ```
use crate::cache::{CacheKey, CacheStats, RankingCache};
use crate::config::BankConfig;
use crate::error::{BankError, BankResult};
use crate::processes::ProcessRunner;
use crate::retrieval::{self, MmrConfig};
use crate::storage::{PatternStore, StorageBackend};
use crate::types::{
    Memory, OptimizationSummary, PatternRecord, ReasoningResult, RetrievalOptions, Trajectory,
    Verdict,
};
use crate::vector::{Embedder, Embedding, HashEmbedder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, trace};

/// The pattern-memory engine.
///
/// Cloning is cheap; clones share the same store and state.
#[derive(Clone)]
pub struct ReasoningBank {
    config: Arc<BankConfig>,
    store: PatternStore,
    embedder: Arc<dyn Embedder>,
    cache: Arc<RankingCache>,
    processes: Arc<ProcessRunner>,
    mmr: MmrConfig,
    /// Inserts and scans hold the read side; optimization holds the write side
    maintenance: Arc<RwLock<()>>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for ReasoningBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningBank")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ReasoningBank {
    /// Open an engine with the placeholder [`HashEmbedder`].
    ///
    /// # Errors
    ///
    /// `BankError::Config` for an invalid configuration, `BankError::Storage`
    /// when an existing snapshot cannot be loaded.
    pub async fn open(config: BankConfig) -> BankResult<Self> {
        let embedder = Arc::new(HashEmbedder::new(config.dimension));
        Self::open_with_embedder(config, embedder).await
    }

    /// Open an engine with a custom embedding provider.
    ///
    /// The provider's dimension must match `config.dimension`.
    pub async fn open_with_embedder(
        config: BankConfig,
        embedder: Arc<dyn Embedder>,
    ) -> BankResult<Self> {
        let backend = config.open_backend().await?;
        info!(
            location = %config.backend_location,
            dimension = config.dimension,
            cache_size = config.cache_size,
            "Opened reasoning bank"
        );

        Self::from_backend(config, backend, embedder)
    }

    /// Build an engine over an already opened storage backend.
    ///
    /// `config.backend_location` is only used for logging here.
    pub fn from_backend(
        config: BankConfig,
        backend: Arc<dyn StorageBackend>,
        embedder: Arc<dyn Embedder>,
    ) -> BankResult<Self> {
        config.validate()?;
        if embedder.dimension() != config.dimension {
            return Err(BankError::config(format!(
                "embedder produces {} dimensions but {} are configured",
                embedder.dimension(),
                config.dimension
            )));
        }

        Ok(Self {
            cache: Arc::new(RankingCache::new(config.cache_size)),
            config: Arc::new(config),
            store: PatternStore::new(backend),
            embedder,
            processes: Arc::new(ProcessRunner::new()),
            mmr: MmrConfig::default(),
            maintenance: Arc::new(RwLock::new(())),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the learning processes. Call before sharing the engine.
    pub fn with_processes(mut self, processes: ProcessRunner) -> Self {
        self.processes = Arc::new(processes);
        self
    }

    /// Replace the MMR settings. Call before sharing the engine.
    pub fn with_mmr(mut self, mmr: MmrConfig) -> Self {
        self.mmr = mmr;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Get the underlying pattern store.
    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    /// Get the embedding provider.
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Get the learning processes.
    pub fn processes(&self) -> &ProcessRunner {
        &self.processes
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> BankResult<()> {
        if self.is_closed() {
            Err(BankError::Closed)
        } else {
            Ok(())
        }
    }

    /// Embed text with the configured provider.
    pub async fn embed(&self, text: &str) -> BankResult<Embedding> {
        self.ensure_open()?;
        self.embedder.embed(text).await
    }

    /// Store a pattern. Returns its id, assigned when the record has none.
    pub async fn insert_pattern(&self, record: PatternRecord) -> BankResult<String> {
        self.ensure_open()?;
        let result = {
            let _gate = self.maintenance.read().await;
            self.store.insert(record).await
        };
        self.cache.invalidate();
        result
    }

    /// Delete a pattern. Unknown ids are a no-op.
    pub async fn delete_pattern(&self, id: &str) -> BankResult<()> {
        self.ensure_open()?;
        let result = {
            let _gate = self.maintenance.read().await;
            self.store.delete(id).await
        };
        self.cache.invalidate();
        result
    }

    /// Rank stored patterns against `embedding`.
    ///
    /// MMR and context synthesis only run when reasoning is enabled, and
    /// `optimize_memory` only when learning is enabled. An empty selection
    /// never carries a context.
    pub async fn retrieve_with_reasoning(
        &self,
        embedding: &Embedding,
        options: &RetrievalOptions,
    ) -> BankResult<ReasoningResult> {
        self.ensure_open()?;

        let effective = RetrievalOptions {
            use_mmr: options.use_mmr && self.config.enable_reasoning,
            synthesize_context: options.synthesize_context && self.config.enable_reasoning,
            optimize_memory: options.optimize_memory && self.config.enable_learning,
            ..options.clone()
        };

        let key = CacheKey::new(embedding, &effective);
        if !effective.optimize_memory {
            if let Some(cached) = self.cache.get(&key) {
                trace!("Ranking cache hit");
                return Ok(cached);
            }
        }

        let generation = self.cache.generation();
        let domain = effective.domain.as_deref();
        let records = {
            let _gate = self.maintenance.read().await;
            self.store.scan(domain, effective.min_confidence).await?
        };

        let ranked = retrieval::rank(&records, embedding);
        let memories: Vec<Memory> = if effective.use_mmr {
            retrieval::mmr_select(ranked, effective.k, &self.mmr)
        } else {
            ranked.into_iter().take(effective.k).collect()
        };

        debug!(
            domain = domain.unwrap_or("*"),
            candidates = records.len(),
            selected = memories.len(),
            mmr = effective.use_mmr,
            "Retrieved patterns"
        );

        let context = if effective.synthesize_context {
            retrieval::synthesize_context(&memories, domain)
        } else {
            None
        };
        let patterns = memories.iter().map(|m| m.pattern.clone()).collect();

        let mut result = ReasoningResult {
            memories,
            context,
            patterns,
            optimizations: None,
        };

        if effective.optimize_memory {
            result.optimizations = Some(self.optimize(domain).await?);
        } else {
            self.cache.put(key, generation, result.clone());
        }

        Ok(result)
    }

    /// Consolidate and prune, optionally limited to one domain.
    ///
    /// Runs exclusively: no insert or scan interleaves with the pass.
    pub async fn optimize(&self, domain: Option<&str>) -> BankResult<OptimizationSummary> {
        self.ensure_open()?;
        let summary = {
            let _gate = self.maintenance.write().await;
            self.processes.optimizer().run(&self.store, domain).await
        };
        self.cache.invalidate();
        summary
    }

    /// Judge a finished trajectory against the memories of its task.
    pub async fn judge_trajectory(&self, trajectory: &Trajectory) -> BankResult<Verdict> {
        self.processes.judge().judge(self, trajectory).await
    }

    /// Store a judged trajectory and distill its domain.
    ///
    /// `domain` defaults to the trajectory's task. Returns the memories the
    /// distillation was based on.
    pub async fn distill_memories(
        &self,
        trajectory: &Trajectory,
        verdict: Verdict,
        domain: Option<&str>,
    ) -> BankResult<Vec<Memory>> {
        self.processes
            .distillation()
            .distill(self, trajectory, verdict, domain)
            .await
    }

    /// Remove every stored pattern.
    pub async fn clear(&self) -> BankResult<()> {
        self.ensure_open()?;
        let result = {
            let _gate = self.maintenance.write().await;
            self.store.clear().await
        };
        self.cache.invalidate();
        result
    }

    /// Flush and release the store. Later calls fail with `BankError::Closed`.
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> BankResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        {
            let _gate = self.maintenance.write().await;
            self.store.close().await?;
        }
        self.cache.invalidate();
        info!(location = %self.config.backend_location, "Closed reasoning bank");
        Ok(())
    }

    /// Pattern counts and ranking cache statistics.
    pub async fn stats(&self) -> BankResult<BankStats> {
        self.ensure_open()?;
        let rows = {
            let _gate = self.maintenance.read().await;
            self.store.scan_rows(None).await?
        };

        let mut by_domain = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        for row in &rows {
            *by_domain.entry(row.domain.clone()).or_insert(0) += 1;
            *by_type.entry(row.kind.clone()).or_insert(0) += 1;
        }

        Ok(BankStats {
            total_patterns: rows.len(),
            by_domain,
            by_type,
            cache: self.cache.stats(),
        })
    }
}

/// Engine statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStats {
    pub total_patterns: usize,
    /// Pattern count per domain
    pub by_domain: BTreeMap<String, usize>,
    /// Pattern count per type tag
    pub by_type: BTreeMap<String, usize>,
    #[serde(skip)]
    pub cache: CacheStats,
}

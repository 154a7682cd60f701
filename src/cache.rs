/// Ranking cache for side-effect-free retrievals.
///
/// Keyed by the query embedding plus every option that affects ranking.
/// Bounded by capacity with oldest-first eviction. Any mutation of the
/// pattern store must call [`RankingCache::invalidate`].
///
/// Every invalidation starts a new generation. A retrieval reads the
/// generation before it scans and hands it to [`RankingCache::put`]; a
/// result computed before an invalidation is never stored.
use crate::types::{ReasoningResult, RetrievalOptions};
use crate::vector::Embedding;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Cache key: the full query, compared exactly.
#[derive(Debug, Clone)]
pub struct CacheKey {
    embedding: Embedding,
    domain: Option<String>,
    k: usize,
    min_confidence: u32,
    use_mmr: bool,
    synthesize_context: bool,
}

impl CacheKey {
    /// Key for a query embedding and its options.
    pub fn new(embedding: &Embedding, options: &RetrievalOptions) -> Self {
        Self {
            embedding: embedding.clone(),
            domain: options.domain.clone(),
            k: options.k,
            min_confidence: options.min_confidence.to_bits(),
            use_mmr: options.use_mmr,
            synthesize_context: options.synthesize_context,
        }
    }

    fn same_embedding(&self, other: &Self) -> bool {
        let (a, b) = (self.embedding.as_slice(), other.embedding.as_slice());
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.domain == other.domain
            && self.k == other.k
            && self.min_confidence == other.min_confidence
            && self.use_mmr == other.use_mmr
            && self.synthesize_context == other.synthesize_context
            && self.same_embedding(other)
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for x in self.embedding.as_slice() {
            x.to_bits().hash(state);
        }
        self.domain.hash(state);
        self.k.hash(state);
        self.min_confidence.hash(state);
        self.use_mmr.hash(state);
        self.synthesize_context.hash(state);
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
    pub invalidations: usize,
}

/// Bounded cache of retrieval results.
#[derive(Debug)]
pub struct RankingCache {
    capacity: usize,
    entries: DashMap<CacheKey, ReasoningResult>,
    /// Insertion order (front = oldest)
    order: Mutex<VecDeque<CacheKey>>,
    generation: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
    invalidations: AtomicUsize,
}

impl RankingCache {
    /// Create a cache holding at most `capacity` results. 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::with_capacity(capacity.min(1024)),
            order: Mutex::new(VecDeque::new()),
            generation: AtomicU64::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    /// Look up a cached result.
    pub fn get(&self, key: &CacheKey) -> Option<ReasoningResult> {
        if self.capacity == 0 {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Current generation. Read it before scanning the store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a result computed in `generation`, evicting the oldest entry
    /// when full. Dropped when an invalidation happened since.
    pub fn put(&self, key: CacheKey, generation: u64, result: ReasoningResult) {
        if self.capacity == 0 {
            return;
        }

        if let Ok(mut order) = self.order.lock() {
            if self.generation.load(Ordering::Acquire) != generation {
                return;
            }
            if self.entries.insert(key.clone(), result).is_none() {
                order.push_back(key);
            }
            while order.len() > self.capacity {
                if let Some(oldest) = order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
    }

    /// Drop every cached result.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut order) = self.order.lock() {
            order.clear();
            self.entries.clear();
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

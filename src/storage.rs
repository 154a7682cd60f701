/// Pattern storage.
///
/// Two layers:
///
/// - [`StorageBackend`] persists [`PatternRow`]s, the flat wire form of a
///   pattern whose `pattern_data` is JSON text holding the embedding and
///   the body. Backends know nothing about embeddings or bodies.
/// - [`PatternStore`] wraps a backend with the typed API: it assigns ids,
///   encodes records into rows, and decodes rows on scan. A row that fails
///   to decode is logged and skipped so one corrupt record never aborts a
///   whole retrieval.
///
/// Scans return rows in insertion order (each row carries a sequence number
/// assigned by the backend). Replacing a row with an existing id keeps its
/// original position.
use crate::error::{BankError, BankResult};
use crate::types::{PatternBody, PatternRecord, PatternType};
use crate::vector::Embedding;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

/// Persisted form of a pattern record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRow {
    pub id: String,
    /// Pattern type name; kept as text so an unknown tag only spoils its own row
    #[serde(rename = "type")]
    pub kind: String,
    pub domain: String,
    /// JSON text of `{"embedding": [...], "pattern": ...}`
    pub pattern_data: String,
    pub confidence: f32,
    pub usage_count: u32,
    pub success_count: u32,
    pub created_at: i64,
    pub last_used: i64,
    /// Insertion sequence, assigned by the backend
    #[serde(default)]
    pub seq: u64,
}

#[derive(Serialize, Deserialize)]
struct PatternData {
    embedding: Embedding,
    pattern: JsonValue,
}

impl PatternRow {
    /// Encode a typed record.
    pub fn encode(record: &PatternRecord) -> BankResult<Self> {
        let data = PatternData {
            embedding: record.embedding.clone(),
            pattern: record.body.content(),
        };

        Ok(Self {
            id: record.id.clone(),
            kind: record.pattern_type().to_string(),
            domain: record.domain.clone(),
            pattern_data: serde_json::to_string(&data)?,
            confidence: record.confidence,
            usage_count: record.usage_count,
            success_count: record.success_count,
            created_at: record.created_at,
            last_used: record.last_used,
            seq: 0,
        })
    }

    /// Decode into a typed record.
    ///
    /// Fails with [`BankError::MalformedPattern`] when the type tag is
    /// unknown, `pattern_data` is not valid JSON, or the payload does not
    /// match the tagged body shape.
    pub fn decode(&self) -> BankResult<PatternRecord> {
        let malformed = |reason: String| BankError::MalformedPattern {
            id: self.id.clone(),
            reason,
        };

        let kind: PatternType = self.kind.parse().map_err(malformed)?;
        let data: PatternData = serde_json::from_str(&self.pattern_data)
            .map_err(|e| malformed(format!("pattern_data: {}", e)))?;
        let body = PatternBody::from_parts(kind, data.pattern)
            .map_err(|e| malformed(format!("{} body: {}", kind, e)))?;

        Ok(PatternRecord {
            id: self.id.clone(),
            domain: self.domain.clone(),
            body,
            embedding: data.embedding,
            confidence: self.confidence,
            usage_count: self.usage_count,
            success_count: self.success_count,
            created_at: self.created_at,
            last_used: self.last_used,
        })
    }
}

/// A persistence backend for pattern rows.
///
/// Implementations must be safe to share across tasks. Filtering semantics:
/// `domain` is an exact match when present, `min_confidence` is inclusive,
/// and results come back in ascending `seq` order.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert or replace a row. The row id is never empty.
    async fn insert(&self, row: PatternRow) -> BankResult<()>;

    /// Rows matching the filters, in insertion order.
    async fn scan(&self, domain: Option<&str>, min_confidence: f32) -> BankResult<Vec<PatternRow>>;

    /// Delete rows by id; unknown ids are ignored. Returns how many existed.
    async fn delete_many(&self, ids: &[String]) -> BankResult<usize>;

    /// Number of stored rows.
    async fn len(&self) -> BankResult<usize>;

    /// Remove every row, including anything persisted.
    async fn clear(&self) -> BankResult<()>;

    /// Flush and release in-memory state. Persisted data survives.
    async fn close(&self) -> BankResult<()>;
}

/// In-memory backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: DashMap<String, PatternRow>,
    next_seq: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with rows (sequence numbers kept).
    pub fn from_rows(rows: Vec<PatternRow>) -> Self {
        let next = rows.iter().map(|r| r.seq + 1).max().unwrap_or(0);
        let backend = Self {
            rows: DashMap::with_capacity(rows.len()),
            next_seq: AtomicU64::new(next),
        };
        for row in rows {
            backend.rows.insert(row.id.clone(), row);
        }
        backend
    }

    /// Snapshot of every row in insertion order.
    pub fn rows(&self) -> Vec<PatternRow> {
        let mut rows: Vec<PatternRow> = self.rows.iter().map(|e| e.value().clone()).collect();
        rows.sort_by_key(|r| r.seq);
        rows
    }

    pub(crate) fn insert_row(&self, mut row: PatternRow) {
        row.seq = match self.rows.get(&row.id) {
            Some(existing) => existing.seq,
            None => self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.rows.insert(row.id.clone(), row);
    }

    pub(crate) fn scan_rows(&self, domain: Option<&str>, min_confidence: f32) -> Vec<PatternRow> {
        let mut rows: Vec<PatternRow> = self
            .rows
            .iter()
            .filter(|e| domain.is_none_or(|d| e.value().domain == d))
            .filter(|e| e.value().confidence >= min_confidence)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|r| r.seq);
        rows
    }

    pub(crate) fn row(&self, id: &str) -> Option<PatternRow> {
        self.rows.get(id).map(|e| e.value().clone())
    }

    pub(crate) fn delete_rows(&self, ids: &[String]) -> usize {
        self.take_rows(ids).len()
    }

    /// Remove rows by id, returning the ones that existed.
    pub(crate) fn take_rows(&self, ids: &[String]) -> Vec<PatternRow> {
        ids.iter()
            .filter_map(|id| self.rows.remove(id.as_str()).map(|(_, row)| row))
            .collect()
    }

    /// Put rows back exactly as they were, sequence numbers included.
    pub(crate) fn restore_rows(&self, rows: Vec<PatternRow>) {
        for row in rows {
            self.rows.insert(row.id.clone(), row);
        }
    }

    pub(crate) fn clear_rows(&self) {
        self.rows.clear();
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert(&self, row: PatternRow) -> BankResult<()> {
        self.insert_row(row);
        Ok(())
    }

    async fn scan(&self, domain: Option<&str>, min_confidence: f32) -> BankResult<Vec<PatternRow>> {
        Ok(self.scan_rows(domain, min_confidence))
    }

    async fn delete_many(&self, ids: &[String]) -> BankResult<usize> {
        Ok(self.delete_rows(ids))
    }

    async fn len(&self) -> BankResult<usize> {
        Ok(self.rows.len())
    }

    async fn clear(&self) -> BankResult<()> {
        self.clear_rows();
        Ok(())
    }

    async fn close(&self) -> BankResult<()> {
        self.clear_rows();
        Ok(())
    }
}

/// Typed pattern store over a [`StorageBackend`].
#[derive(Clone)]
pub struct PatternStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for PatternStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternStore").finish_non_exhaustive()
    }
}

impl PatternStore {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// A store over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Insert a record, assigning an id when it has none. Returns the id.
    ///
    /// No validation of confidence or counters happens here.
    pub async fn insert(&self, mut record: PatternRecord) -> BankResult<String> {
        if record.id.is_empty() {
            record.id = format!("pattern_{}", uuid::Uuid::new_v4().simple());
        }
        let id = record.id.clone();
        self.backend.insert(PatternRow::encode(&record)?).await?;
        trace!(pattern_id = %id, domain = %record.domain, "Pattern inserted");
        Ok(id)
    }

    /// Decoded records matching the filters, in insertion order.
    ///
    /// Rows that fail to decode are skipped with a warning.
    pub async fn scan(&self, domain: Option<&str>, min_confidence: f32) -> BankResult<Vec<PatternRecord>> {
        let rows = self.backend.scan(domain, min_confidence).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match row.decode() {
                Ok(record) => records.push(record),
                Err(e) => warn!(pattern_id = %row.id, error = %e, "Skipping malformed pattern"),
            }
        }
        Ok(records)
    }

    /// Delete one record. Unknown ids are a no-op.
    pub async fn delete(&self, id: &str) -> BankResult<()> {
        self.backend.delete_many(&[id.to_string()]).await?;
        Ok(())
    }

    /// Delete several records at once. Returns how many existed.
    pub async fn delete_many(&self, ids: &[String]) -> BankResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.backend.delete_many(ids).await
    }

    /// Number of stored rows, including any that fail to decode.
    pub async fn len(&self) -> BankResult<usize> {
        self.backend.len().await
    }

    /// Whether the store holds no rows.
    pub async fn is_empty(&self) -> BankResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove everything.
    pub async fn clear(&self) -> BankResult<()> {
        self.backend.clear().await
    }

    /// Flush and release the backend.
    pub async fn close(&self) -> BankResult<()> {
        self.backend.close().await
    }

    /// Raw rows, for callers that need to see undecodable data too.
    pub async fn scan_rows(&self, domain: Option<&str>) -> BankResult<Vec<PatternRow>> {
        self.backend.scan(domain, f32::NEG_INFINITY).await
    }

    /// Insert a raw row as-is. The id must be non-empty.
    pub async fn insert_row(&self, row: PatternRow) -> BankResult<()> {
        if row.id.is_empty() {
            return Err(BankError::Storage("row id must not be empty".to_string()));
        }
        self.backend.insert(row).await
    }
}

/// File-backed pattern storage.
///
/// Rows live in memory and the whole set is written to a single JSON
/// snapshot after every mutation. Writes go to a temporary file first and
/// are then renamed over the target, so a crash mid-write leaves the
/// previous snapshot intact. A mutation whose snapshot write fails is
/// undone in memory before the error is returned.
///
/// # File Format
///
/// ```text
/// { "version": 1, "patterns": [ PatternRow, ... ] }
/// ```
///
/// # Usage
///
/// ```ignore
/// let backend = FileBackend::open(Path::new(".reasoningbank/bank.json")).await?;
/// let store = PatternStore::new(Arc::new(backend));
/// ```
use crate::error::{BankError, BankResult};
use crate::storage::{MemoryBackend, PatternRow, StorageBackend};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    /// Format version for future compatibility
    version: u32,
    patterns: Vec<PatternRow>,
}

/// Pattern backend persisted to a JSON snapshot file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    rows: MemoryBackend,
    /// Serializes mutations so snapshots are written in order
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the file exists but cannot be read,
    /// is not a valid snapshot, or has an incompatible version.
    pub async fn open(path: impl Into<PathBuf>) -> BankResult<Self> {
        let path = path.into();
        let rows = if exists(&path).await {
            load(&path).await?
        } else {
            Vec::new()
        };

        info!(path = %path.display(), patterns = rows.len(), "Opened pattern snapshot");

        Ok(Self {
            path,
            rows: MemoryBackend::from_rows(rows),
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> BankResult<()> {
        save(&self.path, self.rows.rows()).await
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn insert(&self, row: PatternRow) -> BankResult<()> {
        let _guard = self.write_lock.lock().await;
        let id = row.id.clone();
        let previous = self.rows.row(&id);
        self.rows.insert_row(row);

        if let Err(e) = self.persist().await {
            self.rows.take_rows(std::slice::from_ref(&id));
            self.rows.restore_rows(previous.into_iter().collect());
            warn!(pattern_id = %id, error = %e, "Snapshot write failed, insert rolled back");
            return Err(e);
        }
        Ok(())
    }

    async fn scan(&self, domain: Option<&str>, min_confidence: f32) -> BankResult<Vec<PatternRow>> {
        Ok(self.rows.scan_rows(domain, min_confidence))
    }

    async fn delete_many(&self, ids: &[String]) -> BankResult<usize> {
        let _guard = self.write_lock.lock().await;
        let removed = self.rows.take_rows(ids);
        if removed.is_empty() {
            return Ok(0);
        }

        let count = removed.len();
        if let Err(e) = self.persist().await {
            self.rows.restore_rows(removed);
            warn!(error = %e, "Snapshot write failed, delete rolled back");
            return Err(e);
        }
        Ok(count)
    }

    async fn len(&self) -> BankResult<usize> {
        Ok(self.rows.scan_rows(None, f32::NEG_INFINITY).len())
    }

    async fn clear(&self) -> BankResult<()> {
        let _guard = self.write_lock.lock().await;
        let rows = self.rows.rows();
        self.rows.clear_rows();

        if let Err(e) = self.persist().await {
            self.rows.restore_rows(rows);
            warn!(error = %e, "Snapshot write failed, clear rolled back");
            return Err(e);
        }
        Ok(())
    }

    async fn close(&self) -> BankResult<()> {
        let _guard = self.write_lock.lock().await;
        self.persist().await?;
        self.rows.clear_rows();
        debug!(path = %self.path.display(), "Closed pattern snapshot");
        Ok(())
    }
}

/// Write rows to `path` atomically.
pub async fn save(path: &Path, patterns: Vec<PatternRow>) -> BankResult<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BankError::Storage(format!("Failed to create directory: {}", e)))?;
        }
    }

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        patterns,
    };
    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|e| BankError::Storage(format!("Failed to serialize patterns: {}", e)))?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &bytes)
        .await
        .map_err(|e| BankError::Storage(format!("Failed to write temporary file: {}", e)))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| BankError::Storage(format!("Failed to rename file: {}", e)))?;

    Ok(())
}

/// Read rows from the snapshot at `path`.
pub async fn load(path: &Path) -> BankResult<Vec<PatternRow>> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| BankError::Storage(format!("Failed to read pattern file: {}", e)))?;

    let snapshot: Snapshot = serde_json::from_slice(&bytes)
        .map_err(|e| BankError::Storage(format!("Failed to deserialize patterns: {}", e)))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(BankError::Storage(format!(
            "Incompatible snapshot version: {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }

    Ok(snapshot.patterns)
}

/// Check if a snapshot file exists at the given path.
pub async fn exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

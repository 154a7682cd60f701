/// Engine construction configuration.
use crate::error::{BankError, BankResult};
use crate::persistence::FileBackend;
use crate::storage::{MemoryBackend, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Backend location selecting the in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Default dimension of the placeholder embedder.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Configuration for a [`crate::ReasoningBank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// `":memory:"` or a path to the JSON snapshot file.
    pub backend_location: String,
    /// Allow retrieval to trigger the optimizer (default: true).
    pub enable_learning: bool,
    /// Allow MMR diversification and context synthesis (default: true).
    pub enable_reasoning: bool,
    /// Maximum cached rankings; 0 disables the cache (default: 1000).
    pub cache_size: usize,
    /// Embedding length (default: 1536).
    pub dimension: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            backend_location: ".reasoningbank/bank.json".to_string(),
            enable_learning: true,
            enable_reasoning: true,
            cache_size: 1000,
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl BankConfig {
    /// Default settings with the given backend location.
    pub fn new(backend_location: impl Into<String>) -> Self {
        Self {
            backend_location: backend_location.into(),
            ..Self::default()
        }
    }

    /// Default settings over the in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// Set the embedding dimension.
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the ranking cache size.
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Toggle optimizer side effects during retrieval.
    pub fn enable_learning(mut self, enabled: bool) -> Self {
        self.enable_learning = enabled;
        self
    }

    /// Toggle MMR and context synthesis.
    pub fn enable_reasoning(mut self, enabled: bool) -> Self {
        self.enable_reasoning = enabled;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// `BankError::Config` for a blank backend location or a zero dimension.
    pub fn validate(&self) -> BankResult<()> {
        if self.dimension == 0 {
            return Err(BankError::config("dimension must be positive"));
        }
        if self.backend_location.trim().is_empty() {
            return Err(BankError::config("backend location is required"));
        }
        Ok(())
    }

    /// Whether the location selects the in-memory backend.
    pub fn is_in_memory(&self) -> bool {
        self.backend_location.trim() == IN_MEMORY
    }

    /// Validate and open the configured backend.
    pub async fn open_backend(&self) -> BankResult<Arc<dyn StorageBackend>> {
        self.validate()?;
        if self.is_in_memory() {
            return Ok(Arc::new(MemoryBackend::new()));
        }

        let path = Path::new(self.backend_location.trim());
        if path.is_dir() {
            return Err(BankError::config(format!(
                "backend location {} is a directory",
                path.display()
            )));
        }
        Ok(Arc::new(FileBackend::open(path).await?))
    }
}

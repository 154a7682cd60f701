//! Text-to-vector embedding providers.
//!
//! The engine treats embedding as an external function. Any provider must
//! be deterministic for identical input within one engine lifetime and must
//! return unit-normalized vectors of exactly `dimension()` components.

use super::types::Embedding;
use crate::error::{BankError, BankResult};
use async_trait::async_trait;

/// A pluggable text embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> BankResult<Embedding>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;
}

/// Deterministic placeholder embedder.
///
/// Folds character codes into a fixed-length vector (component `i % dim`
/// accumulates `code / 1000`) and L2-normalizes the result. It carries no
/// semantics beyond shared characters and positions, which is enough for
/// exact-match retrieval and tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a placeholder embedder producing `dimension`-length vectors.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn fold(&self, text: &str) -> Vec<f32> {
        let mut data = vec![0.0f32; self.dimension];
        for (i, ch) in text.chars().enumerate() {
            data[i % self.dimension] += ch as u32 as f32 / 1000.0;
        }
        data
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> BankResult<Embedding> {
        if self.dimension == 0 {
            return Err(BankError::Embedding(
                "embedder dimension must be positive".to_string(),
            ));
        }

        Embedding::new(self.fold(text)).normalized().ok_or_else(|| {
            BankError::Embedding("cannot embed text with no characters".to_string())
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

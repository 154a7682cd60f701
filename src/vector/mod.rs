//! Embedding vectors and the providers that produce them.
//!
//! # Example
//!
//! ```ignore
//! use reasoning_bank::vector::{Embedder, HashEmbedder};
//!
//! let embedder = HashEmbedder::new(1536);
//! let a = embedder.embed("index the query").await?;
//! let b = embedder.embed("index the query").await?;
//! assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-6);
//! ```

mod embedder;
mod types;

pub use embedder::{Embedder, HashEmbedder};
pub use types::Embedding;

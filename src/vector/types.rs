//! Embedding type and vector math.
//!
//! Embeddings are fixed-length `f32` vectors shared behind an `Arc`, so
//! cloning one into a retrieval result or a cache entry is cheap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A vector embedding.
///
/// Serializes as a plain JSON array of numbers, which is the shape stored
/// inside a pattern's `pattern_data` payload.
///
/// # Example
///
/// ```ignore
/// let a = Embedding::new(vec![1.0, 0.0]);
/// let b = Embedding::new(vec![0.0, 1.0]);
/// assert_eq!(a.cosine_similarity(&b), 0.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding {
    data: Arc<[f32]>,
}

impl From<Vec<f32>> for Embedding {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.data.to_vec()
    }
}

impl Embedding {
    /// Create an embedding from raw components.
    pub fn new(data: Vec<f32>) -> Self {
        Self {
            data: Arc::from(data.into_boxed_slice()),
        }
    }

    /// A zero vector of the given length.
    pub fn zeros(dimensions: usize) -> Self {
        Self::new(vec![0.0; dimensions])
    }

    /// Get the vector data as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get the number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.data.len()
    }

    /// Euclidean (L2) norm.
    pub fn magnitude(&self) -> f32 {
        self.data.iter().map(|&x| x * x).sum::<f32>().sqrt()
    }

    /// Return a unit-length copy, or `None` for a zero vector.
    pub fn normalized(&self) -> Option<Embedding> {
        let magnitude = self.magnitude();
        if magnitude == 0.0 || !magnitude.is_finite() {
            return None;
        }
        Some(Self::new(self.data.iter().map(|x| x / magnitude).collect()))
    }

    /// Check if this embedding can be compared with another.
    pub fn is_compatible_with(&self, other: &Embedding) -> bool {
        self.dimensions() == other.dimensions()
    }

    /// Compute cosine similarity with another embedding.
    ///
    /// Returns 0.0 when the dimensions differ or either vector has zero
    /// magnitude. The result is always finite.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if !self.is_compatible_with(other) {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut mag_a = 0.0f32;
        let mut mag_b = 0.0f32;
        for (a, b) in self.data.iter().zip(other.data.iter()) {
            dot += a * b;
            mag_a += a * a;
            mag_b += b * b;
        }

        let denominator = mag_a.sqrt() * mag_b.sqrt();
        if denominator == 0.0 || !denominator.is_finite() {
            return 0.0;
        }

        // Rounding can push identical vectors a hair past 1.0
        (dot / denominator).clamp(-1.0, 1.0)
    }
}

impl PartialEq for Embedding {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Hash for Embedding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash each f32 by its bit representation for consistency
        for &value in self.data.iter() {
            value.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Embedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Embedding(dims={})", self.dimensions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_creation() {
        let e = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(e.dimensions(), 3);
        assert_eq!(e.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v1 = Embedding::new(vec![1.0, 0.0, 0.0]);
        let v2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        let sim = v1.cosine_similarity(&v2);
        assert!(
            (sim - 1.0).abs() < 1e-6,
            "Identical vectors should have similarity 1.0"
        );
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let v1 = Embedding::new(vec![1.0, 0.0]);
        let v2 = Embedding::new(vec![0.0, 1.0]);
        assert!(v1.cosine_similarity(&v2).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let v1 = Embedding::new(vec![1.0, 0.0]);
        let v2 = Embedding::new(vec![-1.0, 0.0]);
        assert!((v1.cosine_similarity(&v2) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_dims() {
        let v1 = Embedding::new(vec![1.0, 0.0]);
        let v2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(v1.cosine_similarity(&v2), 0.0);
    }

    #[test]
    fn test_zero_vector() {
        let v1 = Embedding::new(vec![1.0, 0.0]);
        let v2 = Embedding::zeros(2);
        assert_eq!(v1.cosine_similarity(&v2), 0.0);
        assert_eq!(v2.cosine_similarity(&v2), 0.0);
    }

    #[test]
    fn test_normalized() {
        let v = Embedding::new(vec![3.0, 4.0]);
        let n = v.normalized().unwrap();
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
        assert!(Embedding::zeros(4).normalized().is_none());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let v = Embedding::new(vec![0.5, 0.25]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!([0.5, 0.25]));

        let back: Embedding = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}

/// Embedding Math
///
/// Fixed-dimension vector operations over the 576-dim visual embeddings.
/// Pure functions, no allocation beyond the returned vectors.
use ndarray::{Array1, ArrayView1};
use thiserror::Error;

use crate::models::EMBEDDING_DIM;

#[derive(Debug, Error, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("invalid embedding size: expected {expected}, got {actual}")]
    InvalidEmbeddingSize { expected: usize, actual: usize },

    #[error("cannot average an empty list of embeddings")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    let view = ArrayView1::from(v);
    view.dot(&view).sqrt()
}

/// Whether the vector carries no signal (all zeros, including empty).
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Cosine similarity, clamped to [-1, 1] to absorb floating error.
///
/// Returns 0 when either vector is empty or has zero norm. Mismatched
/// lengths between two non-empty vectors are an internal math guard
/// violation and fail with `DimensionMismatch`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.is_empty() || b.is_empty() {
        return Ok(0.0);
    }
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Scale to unit length. A zero vector cannot be normalized and is
/// returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Normalized element-wise mean of a non-empty list of embeddings.
///
/// Every input must have dimension `EMBEDDING_DIM`.
pub fn average(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    if vectors.is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }

    let mut sum = Array1::<f32>::zeros(EMBEDDING_DIM);
    for v in vectors {
        if v.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::InvalidEmbeddingSize {
                expected: EMBEDDING_DIM,
                actual: v.len(),
            });
        }
        sum += &ArrayView1::from(v.as_slice());
    }
    sum /= vectors.len() as f32;

    Ok(normalize(&sum.to_vec()))
}

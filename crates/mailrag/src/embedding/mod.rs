//! Embedding vectors: the remote embedding client and vector similarity
//!
//! - [`Embedder`]: text to vector, implemented by [`OllamaClient`]
//! - [`cosine_similarity`]: strict comparison that rejects mismatched lengths

mod ollama;

pub use ollama::OllamaClient;

use crate::error::{Error, Result};
use crate::models::Embedding;

/// Converts text into a fixed-length vector
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Model name, for logging
    fn model_name(&self) -> &str;
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or exactly `0.0` when either vector has
/// zero magnitude. Vectors of different lengths fail with
/// [`Error::DimensionMismatch`].
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

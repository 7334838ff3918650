//! Hash-derived embeddings for running without an inference backend.
//!
//! Vectors are deterministic and correctly shaped, nothing more: similarity
//! between two fallback vectors carries no semantic meaning.

use tracing::debug;

use crate::constants::{DEFAULT_FALLBACK_DIM, F32_BYTES};

/// Deterministic local embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackEmbedder {
    dim: usize,
}

impl Default for FallbackEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_DIM)
    }
}

impl FallbackEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Fills `dim` components from `blake3(text | counter)` blocks, mapping
    /// each little-endian `u32` linearly onto `[-1, 1]`.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        debug!(text_len = text.len(), dim = self.dim, "Generating fallback embedding");

        let mut values = Vec::with_capacity(self.dim);
        let mut counter: u64 = 0;

        while values.len() < self.dim {
            let mut hasher = blake3::Hasher::new();
            hasher.update(text.as_bytes());
            hasher.update(b"|");
            hasher.update(counter.to_string().as_bytes());
            let digest = hasher.finalize();

            for chunk in digest.as_bytes().chunks_exact(F32_BYTES) {
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                values.push(((raw as f64 / u32::MAX as f64) * 2.0 - 1.0) as f32);
                if values.len() == self.dim {
                    break;
                }
            }
            counter += 1;
        }

        values
    }
}

/// Embeds `text` with the default fallback dimension.
pub fn deterministic_embed(text: &str) -> Vec<f32> {
    FallbackEmbedder::default().embed(text)
}

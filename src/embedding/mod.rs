//! Embedding helpers that do not need a backend.
//!
//! - [`fallback`] provides the deterministic degraded-mode embedder used when no
//!   inference worker can be started.

/// Hash-derived fallback embeddings.
pub mod fallback;

pub use fallback::{FallbackEmbedder, deterministic_embed};

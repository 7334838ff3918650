//! Ranking pipeline: cosine base scores, adaptive hybrid rerank, stable sort.
//!
//! [`rank_candidates`] works against any [`RelevanceBackend`];
//! [`RankSession`] wires it to supervised workers, one per mode.

/// Backend seam (and the scripted mock).
pub mod backend;
/// Ranking defaults.
pub mod config;
/// Scoring and sorting.
pub mod pipeline;
/// Caller-owned worker cache.
pub mod session;
/// Candidates, options and timings.
pub mod types;


#[cfg(any(test, feature = "mock"))]
pub use backend::MockBackend;
pub use backend::RelevanceBackend;
pub use config::RankConfig;
pub use pipeline::{cosine, cosine_from_blob, cosine_to_score, rank_candidates, sort_by_score};
pub use session::RankSession;
pub use types::{Candidate, RankOptions, RankTimings};

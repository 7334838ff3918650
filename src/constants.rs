//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants (e.g. byte sizes) from primary ones to avoid drift.

use std::time::Duration;

/// Bytes per packed `f32` component.
pub const F32_BYTES: usize = 4;

/// Dimension of the hash-derived fallback embedding.
pub const DEFAULT_FALLBACK_DIM: usize = 384;
pub const FALLBACK_EMBEDDING_BYTES: usize = DEFAULT_FALLBACK_DIM * F32_BYTES;

/// Hard cap on how many top candidates may be reranked in one call.
pub const MAX_RERANK_CANDIDATES: usize = 10;
pub const DEFAULT_TOP_K: usize = MAX_RERANK_CANDIDATES;
/// Score spread at or below which the cosine ordering is considered unreliable.
pub const DEFAULT_EPSILON: f32 = 0.05;
/// Queries with at most this many whitespace tokens always trigger reranking.
pub const DEFAULT_SHORT_QUERY_WORDS: usize = 3;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 60;
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Bound on the best-effort `stop` request sent during shutdown.
pub const STOP_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const EMBEDDING_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
pub const COMPLETION_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Snippet characters forwarded to the completion reranker prompt.
pub const RERANK_SNIPPET_CHARS: usize = 800;
pub const RERANK_MAX_TOKENS: u32 = 8;
pub const LLAMA_CTX_SIZE: u32 = 2048;

use std::time::Duration;

use super::config::RankConfig;
use crate::worker::WorkerMode;

/// A caller-owned search hit. The pipeline fills in `base_score` and `score`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Caller identifier, e.g. the member path inside an archive.
    pub key: String,
    pub snippet: String,
    /// Packed embedding blob stored alongside the document.
    pub vector: Option<Vec<u8>>,
    /// Cached norm of `vector`. Ignored unless strictly positive.
    pub norm: Option<f32>,
    /// Cosine relevance mapped to `[0, 1]`.
    pub base_score: f32,
    /// Final relevance: `base_score`, or its mean with the rerank score.
    pub score: f32,
}

impl Candidate {
    pub fn new(key: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            snippet: snippet.into(),
            ..Self::default()
        }
    }

    pub fn with_vector(mut self, blob: Vec<u8>) -> Self {
        self.vector = Some(blob);
        self
    }

    pub fn with_norm(mut self, norm: f32) -> Self {
        self.norm = Some(norm);
        self
    }
}

/// Per-call knobs for [`rank_candidates`](super::rank_candidates).
#[derive(Debug, Clone, PartialEq)]
pub struct RankOptions {
    pub mode: WorkerMode,
    pub top_k: usize,
    pub epsilon: f32,
    pub short_query_words: usize,
    pub max_rerank: usize,
}

impl RankOptions {
    pub fn new(mode: WorkerMode) -> Self {
        Self::from_config(mode, &RankConfig::default())
    }

    pub fn from_config(mode: WorkerMode, config: &RankConfig) -> Self {
        Self {
            mode,
            top_k: config.top_k,
            epsilon: config.epsilon,
            short_query_words: config.short_query_words,
            max_rerank: config.max_rerank,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Size of the rerank slice for `count` candidates.
    pub fn rerank_window(&self, count: usize) -> usize {
        self.top_k.max(1).min(self.max_rerank.max(1)).min(count)
    }

    pub fn is_short_query(&self, query: &str) -> bool {
        query.split_whitespace().count() <= self.short_query_words
    }
}

/// Wall-clock breakdown of one ranking call. Skipped stages report zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankTimings {
    pub embed: Duration,
    pub cosine: Duration,
    pub rerank: Duration,
    /// Number of candidates sent to the reranker.
    pub reranked: usize,
}

impl RankTimings {
    pub fn embed_s(&self) -> f64 {
        self.embed.as_secs_f64()
    }

    pub fn cosine_s(&self) -> f64 {
        self.cosine.as_secs_f64()
    }

    pub fn rerank_s(&self) -> f64 {
        self.rerank.as_secs_f64()
    }
}

use crate::config::ConfigError;
use crate::config::env::parse_or;
use crate::constants::{
    DEFAULT_EPSILON, DEFAULT_SHORT_QUERY_WORDS, DEFAULT_TOP_K, MAX_RERANK_CANDIDATES,
};

#[derive(Debug, Clone, PartialEq)]
/// Ranking defaults applied by [`RankSession`](super::RankSession).
pub struct RankConfig {
    /// Result-count hint; also bounds the rerank slice.
    pub top_k: usize,
    /// Spread at or below which the top slice is reranked.
    pub epsilon: f32,
    /// Queries with at most this many words are always reranked.
    pub short_query_words: usize,
    /// Hard cap on reranked candidates per call.
    pub max_rerank: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            epsilon: DEFAULT_EPSILON,
            short_query_words: DEFAULT_SHORT_QUERY_WORDS,
            max_rerank: MAX_RERANK_CANDIDATES,
        }
    }
}

impl RankConfig {
    const ENV_TOP_K: &'static str = "ARCHIVE_AI_TOPK";
    const ENV_EPSILON: &'static str = "ARCHIVE_AI_EPSILON";
    const ENV_SHORT_QUERY_WORDS: &'static str = "ARCHIVE_AI_SHORT_QUERY_WORDS";

    /// Loads config from environment variables (with defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            top_k: parse_or(Self::ENV_TOP_K, defaults.top_k)?,
            epsilon: parse_or(Self::ENV_EPSILON, defaults.epsilon)?,
            short_query_words: parse_or(Self::ENV_SHORT_QUERY_WORDS, defaults.short_query_words)?,
            max_rerank: defaults.max_rerank,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "epsilon",
                reason: format!("must be finite and non-negative, got {}", self.epsilon),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::OutOfRange {
                name: "top_k",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_rerank == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_rerank",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

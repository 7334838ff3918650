use async_trait::async_trait;

use crate::worker::{Outcome, WorkerHandle, WorkerResult};

/// What the pipeline needs from a model backend.
#[async_trait]
pub trait RelevanceBackend: Send {
    /// Embeds `text`. An empty vector means no usable embedding.
    async fn embed(&mut self, text: &str) -> WorkerResult<Outcome<Vec<f32>>>;

    /// Scores `snippet` against `query` in `[0, 1]`, or returns `fallback`.
    async fn rerank(
        &mut self,
        query: &str,
        snippet: &str,
        fallback: f32,
    ) -> WorkerResult<Outcome<f32>>;
}

#[async_trait]
impl RelevanceBackend for WorkerHandle {
    async fn embed(&mut self, text: &str) -> WorkerResult<Outcome<Vec<f32>>> {
        WorkerHandle::embed(self, text).await
    }

    async fn rerank(
        &mut self,
        query: &str,
        snippet: &str,
        fallback: f32,
    ) -> WorkerResult<Outcome<f32>> {
        WorkerHandle::rerank(self, query, snippet, fallback).await
    }
}

#[cfg(any(test, feature = "mock"))]
use std::collections::HashMap;

#[cfg(any(test, feature = "mock"))]
use crate::rpc::{Op, RpcError};

/// Scripted backend: a fixed query vector and `fallback + offset` rerank
/// scores unless a snippet has an explicit score.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    query_vector: Vec<f32>,
    rerank_offset: f32,
    rerank_scores: HashMap<String, f32>,
    fail_embed: bool,
    embed_calls: usize,
    rerank_calls: Vec<(String, f32)>,
}

#[cfg(any(test, feature = "mock"))]
impl MockBackend {
    pub fn new(query_vector: Vec<f32>) -> Self {
        Self {
            query_vector,
            ..Self::default()
        }
    }

    /// Rerank answers `min(1, fallback + offset)`.
    pub fn with_rerank_offset(mut self, offset: f32) -> Self {
        self.rerank_offset = offset;
        self
    }

    /// Fixed rerank answer for one snippet. Values outside `[0, 1]` are
    /// passed through unchanged.
    pub fn with_rerank_score(mut self, snippet: impl Into<String>, score: f32) -> Self {
        self.rerank_scores.insert(snippet.into(), score);
        self
    }

    /// Every embed call fails with a timeout.
    pub fn failing_embed(mut self) -> Self {
        self.fail_embed = true;
        self
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls
    }

    pub fn rerank_count(&self) -> usize {
        self.rerank_calls.len()
    }

    /// `(snippet, fallback)` for every rerank call, in call order.
    pub fn rerank_calls(&self) -> &[(String, f32)] {
        &self.rerank_calls
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl RelevanceBackend for MockBackend {
    async fn embed(&mut self, _text: &str) -> WorkerResult<Outcome<Vec<f32>>> {
        self.embed_calls += 1;
        if self.fail_embed {
            return Err(RpcError::Timeout {
                op: Op::Embed,
                timeout: std::time::Duration::ZERO,
            }
            .into());
        }
        Ok(Outcome::Live(self.query_vector.clone()))
    }

    async fn rerank(
        &mut self,
        _query: &str,
        snippet: &str,
        fallback: f32,
    ) -> WorkerResult<Outcome<f32>> {
        self.rerank_calls.push((snippet.to_string(), fallback));
        let score = match self.rerank_scores.get(snippet) {
            Some(score) => *score,
            None => (fallback + self.rerank_offset).min(1.0),
        };
        Ok(Outcome::Live(score))
    }
}

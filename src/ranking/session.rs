use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::config::RankConfig;
use super::pipeline::{cosine, cosine_to_score, rank_candidates};
use super::types::{Candidate, RankOptions, RankTimings};
use crate::codec;
use crate::config::{Config, ConfigError};
use crate::worker::{
    Outcome, WorkerConfig, WorkerError, WorkerHandle, WorkerMode, WorkerResult, WorkerState,
};

type SharedHandle = Arc<tokio::sync::Mutex<WorkerHandle>>;

/// Caller-owned ranking context.
///
/// Holds at most one [`WorkerHandle`] per mode, created on first use and
/// shared by every call for that mode. Calls on the same mode are serialized;
/// different modes run independently. [`shutdown`](Self::shutdown) stops all
/// backends and makes the session refuse further work.
pub struct RankSession {
    worker: WorkerConfig,
    ranking: RankConfig,
    handles: Mutex<HashMap<WorkerMode, SharedHandle>>,
    closed: AtomicBool,
}

impl RankSession {
    pub fn new(worker: WorkerConfig, ranking: RankConfig) -> Self {
        Self {
            worker,
            ranking,
            handles: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.worker.clone(), config.ranking.clone())
    }

    /// Builds a session from `ARCHIVE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::from_env()?;
        config.validate()?;
        Ok(Self::from_config(&config))
    }

    pub fn ranking(&self) -> &RankConfig {
        &self.ranking
    }

    pub fn worker_config(&self) -> &WorkerConfig {
        &self.worker
    }

    /// Ranks `candidates` in place with the session's defaults.
    pub async fn rank(
        &self,
        query: &str,
        candidates: &mut [Candidate],
        mode: WorkerMode,
    ) -> WorkerResult<RankTimings> {
        let options = RankOptions::from_config(mode, &self.ranking);
        self.rank_with(query, candidates, &options).await
    }

    /// Ranks `candidates` in place with explicit options.
    pub async fn rank_with(
        &self,
        query: &str,
        candidates: &mut [Candidate],
        options: &RankOptions,
    ) -> WorkerResult<RankTimings> {
        let handle = self.handle(options.mode)?;
        let mut worker = handle.lock().await;
        Ok(rank_candidates(&mut *worker, query, candidates, options).await)
    }

    pub async fn embed(&self, text: &str, mode: WorkerMode) -> WorkerResult<Outcome<Vec<f32>>> {
        let handle = self.handle(mode)?;
        let mut worker = handle.lock().await;
        worker.embed(text).await
    }

    pub async fn rerank(
        &self,
        query: &str,
        snippet: &str,
        fallback: f32,
    ) -> WorkerResult<Outcome<f32>> {
        let handle = self.handle(WorkerMode::Hybrid)?;
        let mut worker = handle.lock().await;
        worker.rerank(query, snippet, fallback).await
    }

    /// Relevance of a single snippet: cosine of the two embeddings mapped to
    /// `[0, 1]`, or 0 when either embedding is unusable.
    pub async fn score(&self, query: &str, snippet: &str, mode: WorkerMode) -> WorkerResult<f32> {
        let handle = self.handle(mode)?;
        let mut worker = handle.lock().await;

        let query_vector = worker.embed(query).await?.into_inner();
        let snippet_vector = worker.embed(snippet).await?.into_inner();
        let similarity = cosine(
            &query_vector,
            codec::norm(&query_vector),
            &snippet_vector,
            codec::norm(&snippet_vector),
        );
        Ok(similarity.map(cosine_to_score).unwrap_or(0.0))
    }

    /// State of the handle for `mode`, if one was created.
    pub async fn state(&self, mode: WorkerMode) -> Option<WorkerState> {
        let handle = self.handles.lock().get(&mode).cloned()?;
        let worker = handle.lock().await;
        Some(worker.state())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops every backend. Later calls fail with [`WorkerError::Stopped`].
    pub async fn shutdown(&self) {
        let handles: Vec<SharedHandle> = {
            let handles = self.handles.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            handles.values().cloned().collect()
        };
        for handle in handles {
            handle.lock().await.shutdown().await;
        }
        info!("Rank session shut down");
    }

    /// The closed check and the insert happen under the map lock so that no
    /// handle is created after `shutdown` has collected the map.
    fn handle(&self, mode: WorkerMode) -> WorkerResult<SharedHandle> {
        let mut handles = self.handles.lock();
        if self.is_closed() {
            return Err(WorkerError::Stopped { mode });
        }
        let handle = handles.entry(mode).or_insert_with(|| {
            debug!(%mode, "Creating worker handle");
            Arc::new(tokio::sync::Mutex::new(WorkerHandle::new(
                mode,
                self.worker.clone(),
            )))
        });
        Ok(Arc::clone(handle))
    }
}

impl std::fmt::Debug for RankSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankSession")
            .field("ranking", &self.ranking)
            .field("modes", &self.handles.lock().keys().collect::<Vec<_>>())
            .field("closed", &self.is_closed())
            .finish()
    }
}

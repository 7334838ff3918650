use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::WorkerConfig;
use super::error::{WorkerError, WorkerResult};
use super::transport::{Call, Reply, Transport};
use super::types::{Outcome, WorkerMode, WorkerState};
use crate::embedding::FallbackEmbedder;
use crate::rpc::{RpcError, RpcResult};

/// Supervises the backend for one [`WorkerMode`].
///
/// The backend is launched lazily on first use. If it cannot be brought up,
/// the handle settles in [`WorkerState::DegradedLocal`] and keeps answering
/// with hash embeddings and caller fallbacks. A backend that dies while ready
/// is replaced on the next call; a backend that dies mid-call is restarted
/// once and the call retried.
#[derive(Debug)]
pub struct WorkerHandle {
    mode: WorkerMode,
    config: WorkerConfig,
    state: WorkerState,
    transport: Option<Transport>,
    startup_time: Option<Duration>,
    /// Set when a stdio call timed out; its reply may still arrive later.
    desynced: bool,
    fallback: FallbackEmbedder,
}

impl WorkerHandle {
    pub fn new(mode: WorkerMode, config: WorkerConfig) -> Self {
        let fallback = FallbackEmbedder::new(config.fallback_dim);
        Self {
            mode,
            config,
            state: WorkerState::Unstarted,
            transport: None,
            startup_time: None,
            desynced: false,
            fallback,
        }
    }

    pub fn mode(&self) -> WorkerMode {
        self.mode
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Duration of the most recent successful launch.
    pub fn startup_time(&self) -> Option<Duration> {
        self.startup_time
    }

    /// Launches the backend if it is not running yet and returns the
    /// resulting state. A failed launch is not an error.
    pub async fn start(&mut self) -> WorkerResult<WorkerState> {
        self.ensure_live().await?;
        Ok(self.state)
    }

    /// Embeds `text`.
    ///
    /// Degraded handles answer with the local hash embedding. A malformed
    /// backend reply yields an empty vector. Timeouts, backend errors and a
    /// second consecutive crash are returned as errors.
    pub async fn embed(&mut self, text: &str) -> WorkerResult<Outcome<Vec<f32>>> {
        match self.call(Call::Embed(text)).await {
            Ok(Some(reply)) => match reply.into_embedding() {
                Some(vector) => Ok(Outcome::Live(vector)),
                None => Ok(Outcome::Degraded(Vec::new())),
            },
            Ok(None) => Ok(Outcome::Degraded(self.fallback.embed(text))),
            Err(WorkerError::Rpc(e)) if e.is_malformed() => {
                warn!(mode = %self.mode, error = %e, "Discarding malformed embedding");
                Ok(Outcome::Degraded(Vec::new()))
            }
            Err(e) => Err(e),
        }
    }

    /// Scores `snippet` against `query`, always producing a value.
    ///
    /// `fallback` is returned whenever the backend is unavailable, fails, or
    /// answers outside `[0, 1]`. Only a stopped handle is an error.
    pub async fn rerank(
        &mut self,
        query: &str,
        snippet: &str,
        fallback: f32,
    ) -> WorkerResult<Outcome<f32>> {
        let call = Call::Rerank {
            query,
            snippet,
            fallback,
        };
        match self.call(call).await {
            Ok(Some(reply)) => match reply.into_score() {
                Some(score) => Ok(Outcome::Live(score)),
                None => Ok(Outcome::Degraded(fallback)),
            },
            Ok(None) => Ok(Outcome::Degraded(fallback)),
            Err(e @ WorkerError::Stopped { .. }) => Err(e),
            Err(e) => {
                warn!(mode = %self.mode, error = %e, fallback, "Rerank failed, using fallback");
                Ok(Outcome::Degraded(fallback))
            }
        }
    }

    /// Returns `true` if a live backend answered the probe, `false` when the
    /// handle is degraded.
    pub async fn health(&mut self) -> WorkerResult<bool> {
        Ok(self.call(Call::Health).await?.is_some())
    }

    /// Stops the backend and makes the handle terminal. Safe to call on
    /// handles that never started or are already stopped.
    pub async fn shutdown(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.shutdown(self.config.shutdown_grace).await;
        }
        info!(mode = %self.mode, from = %self.state, "Worker stopped");
        self.state = WorkerState::Stopped;
    }

    /// `Ok(None)` means no live backend: the caller substitutes a local value.
    async fn call(&mut self, call: Call<'_>) -> WorkerResult<Option<Reply>> {
        if !self.ensure_live().await? {
            return Ok(None);
        }

        match self.dispatch(&call).await {
            Ok(reply) => Ok(Some(reply)),
            Err(e) if e.is_channel_failure() || self.transport_exited() => {
                warn!(
                    mode = %self.mode,
                    op = %call.op(),
                    error = %e,
                    "Worker lost mid-call, restarting"
                );
                self.transport = None;
                if !self.launch().await {
                    return Ok(None);
                }
                Ok(Some(self.dispatch(&call).await?))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dispatch(&mut self, call: &Call<'_>) -> RpcResult<Reply> {
        let timeout = self.config.request_timeout;
        let Some(transport) = self.transport.as_mut() else {
            return Err(RpcError::WorkerExited);
        };

        // Stays set if this future is dropped before the reply is read.
        let stdio = transport.is_stdio();
        self.desynced = stdio;

        let started = Instant::now();
        let result = transport.dispatch(call, timeout).await;
        self.desynced = stdio && result.as_ref().is_err_and(RpcError::is_timeout);
        debug!(
            mode = %self.mode,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Worker call finished"
        );
        result
    }

    fn transport_exited(&mut self) -> bool {
        self.transport.as_mut().is_some_and(Transport::has_exited)
    }

    /// Returns whether a live backend is available, launching or replacing
    /// it as needed.
    async fn ensure_live(&mut self) -> WorkerResult<bool> {
        match self.state {
            WorkerState::Stopped => Err(WorkerError::Stopped { mode: self.mode }),
            WorkerState::DegradedLocal => Ok(false),
            WorkerState::Unstarted | WorkerState::Starting => Ok(self.launch().await),
            WorkerState::Ready => {
                let exited = self
                    .transport
                    .as_mut()
                    .is_none_or(|transport| transport.has_exited());
                if !exited && !self.desynced {
                    return Ok(true);
                }

                if exited {
                    info!(mode = %self.mode, "Worker exited, relaunching");
                    self.transport = None;
                } else if let Some(mut transport) = self.transport.take() {
                    info!(mode = %self.mode, "Worker has an unanswered request, relaunching");
                    transport.shutdown(self.config.shutdown_grace).await;
                }
                Ok(self.launch().await)
            }
        }
    }

    /// Moves to `Ready` on success, `DegradedLocal` on failure.
    async fn launch(&mut self) -> bool {
        self.state = WorkerState::Starting;
        self.desynced = false;
        let started = Instant::now();

        match Transport::launch(&self.config, self.mode).await {
            Ok(transport) => {
                let elapsed = started.elapsed();
                self.transport = Some(transport);
                self.startup_time = Some(elapsed);
                self.state = WorkerState::Ready;
                info!(
                    mode = %self.mode,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Worker ready"
                );
                true
            }
            Err(e) => {
                warn!(
                    mode = %self.mode,
                    error = %e,
                    "Worker failed to start, using local fallback"
                );
                self.transport = None;
                self.state = WorkerState::DegradedLocal;
                false
            }
        }
    }
}

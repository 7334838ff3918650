use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::config::{BackendKind, WorkerConfig};
use super::error::{WorkerError, WorkerResult};
use super::llama::LlamaBackend;
use super::types::WorkerMode;
use crate::constants::STOP_REQUEST_TIMEOUT;
use crate::rpc::{ChildChannel, Op, Request, RpcError, RpcResult, ServeBackend};

/// A single supervisor call, independent of transport.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Call<'a> {
    Health,
    Embed(&'a str),
    Rerank {
        query: &'a str,
        snippet: &'a str,
        fallback: f32,
    },
}

impl Call<'_> {
    pub(crate) fn op(&self) -> Op {
        match self {
            Call::Health => Op::Health,
            Call::Embed(_) => Op::Embed,
            Call::Rerank { .. } => Op::Rerank,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Reply {
    Health,
    Embedding(Vec<f32>),
    /// `None` when the backend produced no usable score.
    Score(Option<f32>),
}

impl Reply {
    pub(crate) fn into_embedding(self) -> Option<Vec<f32>> {
        match self {
            Reply::Embedding(vector) => Some(vector),
            _ => None,
        }
    }

    pub(crate) fn into_score(self) -> Option<f32> {
        match self {
            Reply::Score(score) => score,
            _ => None,
        }
    }
}

/// Persistent `qx-worker` child plus its line channel.
#[derive(Debug)]
pub(crate) struct StdioWorker {
    child: Child,
    channel: ChildChannel,
}

impl StdioWorker {
    /// Spawns `worker_bin worker_args.. --worker-mode <mode>` and waits for a
    /// health reply within the startup timeout.
    async fn launch(config: &WorkerConfig, mode: WorkerMode) -> WorkerResult<Self> {
        let mut child = Command::new(&config.worker_bin)
            .args(&config.worker_args)
            .args(["--worker-mode", mode.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WorkerError::startup(format!(
                    "failed to spawn {}: {e}",
                    config.worker_bin.display()
                ))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill().await;
            return Err(WorkerError::startup("worker pipes unavailable"));
        };

        let mut worker = Self {
            child,
            channel: ChildChannel::from_child(stdin, stdout),
        };

        if let Err(e) = worker
            .channel
            .call(&Request::Health, config.startup_timeout)
            .await
        {
            let _ = worker.child.kill().await;
            return Err(WorkerError::startup(format!("health probe failed: {e}")));
        }

        debug!(pid = ?worker.child.id(), %mode, "Worker answered health probe");
        Ok(worker)
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    async fn dispatch(&mut self, call: &Call<'_>, timeout: Duration) -> RpcResult<Reply> {
        match *call {
            Call::Health => {
                self.channel.call(&Request::Health, timeout).await?;
                Ok(Reply::Health)
            }
            Call::Embed(text) => {
                let response = self.channel.call(&Request::embed(text), timeout).await?;
                Ok(Reply::Embedding(response.into_embedding()?))
            }
            Call::Rerank {
                query,
                snippet,
                fallback,
            } => {
                let response = self
                    .channel
                    .call(&Request::rerank(query, snippet, fallback), timeout)
                    .await?;
                Ok(Reply::Score(response.rerank_score()))
            }
        }
    }

    /// Best-effort `stop`, then a bounded wait, then kill.
    async fn shutdown(&mut self, grace: Duration) {
        if self.has_exited() {
            return;
        }
        if let Err(e) = self.channel.call(&Request::Stop, STOP_REQUEST_TIMEOUT).await {
            debug!(error = %e, "Stop request not acknowledged");
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!(pid = ?self.child.id(), "Worker ignored stop, killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

/// The live backend behind a [`WorkerHandle`](super::WorkerHandle).
#[derive(Debug)]
pub(crate) enum Transport {
    Stdio(StdioWorker),
    Http(LlamaBackend),
}

impl Transport {
    pub(crate) async fn launch(config: &WorkerConfig, mode: WorkerMode) -> WorkerResult<Self> {
        match config.backend {
            BackendKind::Stdio => {
                let worker = StdioWorker::launch(config, mode).await?;
                info!(%mode, bin = %config.worker_bin.display(), "Stdio worker started");
                Ok(Transport::Stdio(worker))
            }
            BackendKind::Http => {
                let backend =
                    LlamaBackend::start(&config.llama, mode, config.startup_timeout).await?;
                info!(
                    %mode,
                    embed_load_s = backend.embed_load_time().as_secs_f64(),
                    rerank_load_s = backend.rerank_load_time().as_secs_f64(),
                    "llama-server backend started"
                );
                Ok(Transport::Http(backend))
            }
        }
    }

    pub(crate) fn is_stdio(&self) -> bool {
        matches!(self, Transport::Stdio(_))
    }

    pub(crate) fn has_exited(&mut self) -> bool {
        match self {
            Transport::Stdio(worker) => worker.has_exited(),
            Transport::Http(backend) => backend.has_exited(),
        }
    }

    pub(crate) async fn dispatch(&mut self, call: &Call<'_>, timeout: Duration) -> RpcResult<Reply> {
        match self {
            Transport::Stdio(worker) => worker.dispatch(call, timeout).await,
            Transport::Http(backend) => {
                let op = call.op();
                let work = async {
                    match *call {
                        Call::Health => backend.health().await.map(|()| Reply::Health),
                        Call::Embed(text) => backend.embed(text).await.map(Reply::Embedding),
                        Call::Rerank { query, snippet, .. } => {
                            backend.rerank(query, snippet).await.map(Reply::Score)
                        }
                    }
                };
                match tokio::time::timeout(timeout, work).await {
                    Ok(result) => result,
                    Err(_) => Err(RpcError::Timeout { op, timeout }),
                }
            }
        }
    }

    pub(crate) async fn shutdown(&mut self, grace: Duration) {
        match self {
            Transport::Stdio(worker) => worker.shutdown(grace).await,
            Transport::Http(backend) => backend.stop(grace).await,
        }
    }
}

//! llama-server child processes, one per model, each on its own loopback port.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::config::LlamaConfig;
use super::error::{WorkerError, WorkerResult};
use super::types::WorkerMode;
use crate::constants::HEALTH_POLL_INTERVAL;
use crate::rpc::{HttpChannel, RpcError, RpcResult, ServeBackend};

/// Asks the OS for an unused loopback port.
pub async fn find_free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a server instance is loaded for.
pub enum ServerRole {
    Embedding,
    Completion,
}

impl ServerRole {
    fn as_str(&self) -> &'static str {
        match self {
            ServerRole::Embedding => "embedding",
            ServerRole::Completion => "completion",
        }
    }
}

/// One running llama-server.
pub struct LlamaServer {
    role: ServerRole,
    port: u16,
    child: Child,
    channel: HttpChannel,
    start_time: Duration,
}

impl std::fmt::Debug for LlamaServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaServer")
            .field("role", &self.role)
            .field("port", &self.port)
            .field("start_time", &self.start_time)
            .finish()
    }
}

impl LlamaServer {
    /// Spawns the server and polls `/health` until it answers or
    /// `startup_timeout` elapses. Exiting during the probe is a hard failure.
    pub async fn start(
        config: &LlamaConfig,
        role: ServerRole,
        startup_timeout: Duration,
    ) -> WorkerResult<Self> {
        let model = match role {
            ServerRole::Embedding => &config.embed_model,
            ServerRole::Completion => &config.rerank_model,
        };
        let port = find_free_port()
            .await
            .map_err(|e| WorkerError::startup(format!("no free port: {e}")))?;

        let started = Instant::now();
        let child = Self::command(config, model, port, role)
            .spawn()
            .map_err(|e| {
                WorkerError::startup(format!(
                    "failed to spawn {}: {e}",
                    config.llama_bin.display()
                ))
            })?;

        let mut server = Self {
            role,
            port,
            child,
            channel: HttpChannel::for_port(port),
            start_time: Duration::ZERO,
        };

        if let Err(e) = server.wait_ready(startup_timeout).await {
            server.kill().await;
            return Err(e);
        }

        server.start_time = started.elapsed();
        info!(
            role = role.as_str(),
            port,
            model = %model.display(),
            load_ms = server.start_time.as_millis() as u64,
            "llama-server ready"
        );
        Ok(server)
    }

    fn command(config: &LlamaConfig, model: &Path, port: u16, role: ServerRole) -> Command {
        let mut cmd = Command::new(&config.llama_bin);
        cmd.arg("-m")
            .arg(model)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .args(["--n-gpu-layers", "0", "--ctx-size"])
            .arg(config.ctx_size.to_string())
            .args([
                "--temp",
                "0",
                "--top-k",
                "1",
                "--top-p",
                "1",
                "--repeat-penalty",
                "1",
                "--mirostat",
                "0",
            ]);
        if role == ServerRole::Embedding {
            cmd.arg("--embedding");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    async fn wait_ready(&mut self, startup_timeout: Duration) -> WorkerResult<()> {
        let deadline = Instant::now() + startup_timeout;
        let mut last_err: Option<RpcError> = None;

        while Instant::now() < deadline {
            if self.has_exited() {
                return Err(WorkerError::startup(format!(
                    "llama-server ({}) terminated during startup",
                    self.role.as_str()
                )));
            }
            match self.channel.health().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!(port = self.port, error = %e, "llama-server not ready yet");
                    last_err = Some(e);
                }
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }

        Err(WorkerError::startup(format!(
            "llama-server ({}) did not become ready within {:?}: {}",
            self.role.as_str(),
            startup_timeout,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub fn role(&self) -> ServerRole {
        self.role
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn start_time(&self) -> Duration {
        self.start_time
    }

    pub fn channel(&self) -> &HttpChannel {
        &self.channel
    }

    /// Returns `true` once the process has exited (or cannot be polled).
    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Kills the process and waits up to `grace` for it to be reaped.
    pub async fn stop(&mut self, grace: Duration) {
        if self.has_exited() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!(port = self.port, error = %e, "Failed to signal llama-server");
        }
        if tokio::time::timeout(grace, self.child.wait()).await.is_err() {
            warn!(port = self.port, "llama-server did not exit within grace period");
        }
    }

    async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// The llama-server set for one mode: an embedding server, plus a completion
/// server in hybrid mode.
#[derive(Debug)]
pub struct LlamaBackend {
    embed: Option<LlamaServer>,
    rerank: Option<LlamaServer>,
}

impl LlamaBackend {
    /// Starts every server `mode` needs. If the second one fails, the first
    /// is stopped before the error is returned.
    pub async fn start(
        config: &LlamaConfig,
        mode: WorkerMode,
        startup_timeout: Duration,
    ) -> WorkerResult<Self> {
        let mut embed = LlamaServer::start(config, ServerRole::Embedding, startup_timeout).await?;

        let rerank = if mode.has_reranker() {
            match LlamaServer::start(config, ServerRole::Completion, startup_timeout).await {
                Ok(server) => Some(server),
                Err(e) => {
                    embed.kill().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            embed: Some(embed),
            rerank,
        })
    }

    pub fn embed_load_time(&self) -> Duration {
        self.embed
            .as_ref()
            .map(LlamaServer::start_time)
            .unwrap_or_default()
    }

    pub fn rerank_load_time(&self) -> Duration {
        self.rerank
            .as_ref()
            .map(LlamaServer::start_time)
            .unwrap_or_default()
    }

    pub fn has_reranker(&self) -> bool {
        self.rerank.is_some()
    }

    /// Returns `true` if any of the servers has exited.
    pub fn has_exited(&mut self) -> bool {
        self.embed.as_mut().is_some_and(LlamaServer::has_exited)
            || self.rerank.as_mut().is_some_and(LlamaServer::has_exited)
    }

    pub async fn health(&self) -> RpcResult<()> {
        for server in self.embed.iter().chain(self.rerank.iter()) {
            server.channel().health().await?;
        }
        Ok(())
    }

    pub async fn stop(&mut self, grace: Duration) {
        if let Some(server) = self.rerank.as_mut() {
            server.stop(grace).await;
        }
        if let Some(server) = self.embed.as_mut() {
            server.stop(grace).await;
        }
    }
}

#[async_trait]
impl ServeBackend for LlamaBackend {
    async fn embed(&mut self, text: &str) -> RpcResult<Vec<f32>> {
        match &self.embed {
            Some(server) => server.channel().embedding(text).await,
            None => Err(RpcError::Backend {
                message: "embedding server not enabled".to_string(),
            }),
        }
    }

    async fn rerank(&mut self, query: &str, snippet: &str) -> RpcResult<Option<f32>> {
        match &self.rerank {
            Some(server) => server.channel().rerank_score(query, snippet).await,
            None => Ok(None),
        }
    }
}

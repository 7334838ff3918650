use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ConfigError;
use crate::config::env::{parse_or, path_or, var};
use crate::constants::{
    DEFAULT_FALLBACK_DIM, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STARTUP_TIMEOUT_SECS,
    LLAMA_CTX_SIZE, SHUTDOWN_GRACE,
};

/// Default embedding model (GGUF).
pub const DEFAULT_EMBED_MODEL: &str = "~/models/BGE/bge-small-en-v1.5-q4_k_m.gguf";
/// Default completion model used for reranking (GGUF).
pub const DEFAULT_RERANK_MODEL: &str = "~/models/Qwen/models/Qwen2.5-1.5B-Instruct-Q4_K_M.gguf";
pub const DEFAULT_LLAMA_BIN: &str = "llama-server";
pub const DEFAULT_WORKER_BIN: &str = "qx-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Which transport the supervisor uses to reach the models.
pub enum BackendKind {
    /// Persistent `qx-worker` process speaking the line protocol.
    #[default]
    Stdio,
    /// llama-server processes queried directly over loopback HTTP.
    Http,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" | "worker" => Ok(Self::Stdio),
            "http" | "llama" | "llama-server" => Ok(Self::Http),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
/// llama-server launch settings.
pub struct LlamaConfig {
    /// Server executable.
    pub llama_bin: PathBuf,
    /// Model served with `--embedding`.
    pub embed_model: PathBuf,
    /// Model used for completion-based reranking (hybrid only).
    pub rerank_model: PathBuf,
    /// `--ctx-size` passed to every server.
    pub ctx_size: u32,
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            llama_bin: PathBuf::from(DEFAULT_LLAMA_BIN),
            embed_model: crate::config::expand_home(DEFAULT_EMBED_MODEL),
            rerank_model: crate::config::expand_home(DEFAULT_RERANK_MODEL),
            ctx_size: LLAMA_CTX_SIZE,
        }
    }
}

impl LlamaConfig {
    const ENV_LLAMA_BIN: &'static str = "ARCHIVE_LLAMA_BIN";
    const ENV_EMBED_MODEL: &'static str = "ARCHIVE_AI_EMBED_MODEL";
    const ENV_RERANK_MODEL: &'static str = "ARCHIVE_AI_RERANK_MODEL";

    /// Loads config from environment variables (with defaults).
    pub fn from_env() -> Self {
        Self {
            llama_bin: path_or(Self::ENV_LLAMA_BIN, DEFAULT_LLAMA_BIN),
            embed_model: path_or(Self::ENV_EMBED_MODEL, DEFAULT_EMBED_MODEL),
            rerank_model: path_or(Self::ENV_RERANK_MODEL, DEFAULT_RERANK_MODEL),
            ctx_size: LLAMA_CTX_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
/// Supervisor configuration.
pub struct WorkerConfig {
    /// Transport selection.
    pub backend: BackendKind,
    /// Worker executable for [`BackendKind::Stdio`].
    pub worker_bin: PathBuf,
    /// Arguments placed before `--worker-mode <mode>`.
    pub worker_args: Vec<String>,
    /// llama-server settings for [`BackendKind::Http`].
    pub llama: LlamaConfig,
    /// Per-call response window.
    pub request_timeout: Duration,
    /// Deadline for a backend to pass its readiness probe.
    pub startup_timeout: Duration,
    /// How long shutdown waits for a graceful exit before killing.
    pub shutdown_grace: Duration,
    /// Dimension of degraded-mode embeddings.
    pub fallback_dim: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            worker_bin: PathBuf::from(DEFAULT_WORKER_BIN),
            worker_args: Vec::new(),
            llama: LlamaConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
            shutdown_grace: SHUTDOWN_GRACE,
            fallback_dim: DEFAULT_FALLBACK_DIM,
        }
    }
}

impl WorkerConfig {
    const ENV_BACKEND: &'static str = "ARCHIVE_AI_BACKEND";
    const ENV_WORKER_BIN: &'static str = "ARCHIVE_AI_WORKER_BIN";
    const ENV_REQUEST_TIMEOUT_SECS: &'static str = "ARCHIVE_AI_TIMEOUT_SECS";
    const ENV_STARTUP_TIMEOUT_SECS: &'static str = "ARCHIVE_AI_STARTUP_TIMEOUT_SECS";
    const ENV_FALLBACK_DIM: &'static str = "ARCHIVE_AI_FALLBACK_DIM";

    /// Loads config from environment variables (with defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match var(Self::ENV_BACKEND) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: Self::ENV_BACKEND,
                value,
            })?,
            None => defaults.backend,
        };

        let worker_bin = var(Self::ENV_WORKER_BIN)
            .map(PathBuf::from)
            .unwrap_or(defaults.worker_bin);

        let request_timeout = Duration::from_secs(parse_or(
            Self::ENV_REQUEST_TIMEOUT_SECS,
            defaults.request_timeout.as_secs(),
        )?);
        let startup_timeout = Duration::from_secs(parse_or(
            Self::ENV_STARTUP_TIMEOUT_SECS,
            defaults.startup_timeout.as_secs(),
        )?);
        let fallback_dim = parse_or(Self::ENV_FALLBACK_DIM, defaults.fallback_dim)?;

        Ok(Self {
            backend,
            worker_bin,
            worker_args: defaults.worker_args,
            llama: LlamaConfig::from_env(),
            request_timeout,
            startup_timeout,
            shutdown_grace: defaults.shutdown_grace,
            fallback_dim,
        })
    }

    /// Rejects zero timeouts and a zero fallback dimension.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                name: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.startup_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                name: "startup_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.fallback_dim == 0 {
            return Err(ConfigError::OutOfRange {
                name: "fallback_dim",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Uses `bin args.. --worker-mode <mode>` as the worker command line.
    pub fn with_worker_command<P, I, S>(mut self, bin: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_bin = bin.into();
        self.worker_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

//! Worker process supervisor.
//!
//! A [`WorkerHandle`] owns the backend for one [`WorkerMode`] and guarantees
//! every call ends in a live answer, a local fallback, or a typed error.
//! Two transports sit behind it:
//!
//! - a persistent `qx-worker` child speaking line-delimited JSON on stdio;
//! - llama-server processes ([`LlamaBackend`]) queried over loopback HTTP.

pub mod config;
pub mod error;
pub mod handle;
pub mod llama;
mod transport;
pub mod types;


pub use config::{
    BackendKind, DEFAULT_EMBED_MODEL, DEFAULT_LLAMA_BIN, DEFAULT_RERANK_MODEL,
    DEFAULT_WORKER_BIN, LlamaConfig, WorkerConfig,
};
pub use error::{WorkerError, WorkerResult};
pub use handle::WorkerHandle;
pub use llama::{LlamaBackend, LlamaServer, ServerRole, find_free_port};
pub use types::{Outcome, WorkerMode, WorkerState};

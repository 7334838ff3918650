//! qx-rank library crate (used by the `qx-worker` binary and integration tests).
//!
//! # Public API Surface
//!
//! ## Ranking
//! - [`RankSession`] - caller-owned entry point, one supervised worker per mode
//! - [`rank_candidates`], [`Candidate`], [`RankOptions`], [`RankTimings`]
//! - [`RelevanceBackend`] - seam between the pipeline and a model backend
//!
//! ## Worker Supervision
//! - [`WorkerHandle`], [`WorkerConfig`], [`WorkerState`], [`Outcome`]
//! - [`LlamaBackend`] - llama-server processes behind the HTTP transport
//!
//! ## Wire Formats
//! - [`codec`] - packed little-endian `f32` blobs
//! - [`rpc`] - line protocol, stdio/HTTP channels and the worker serve loop
//!
//! ## Degraded Mode
//! - [`FallbackEmbedder`] - deterministic hash embedding used when no backend
//!   can be started
//!
//! ## Test/Mock Support
//! [`MockBackend`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod codec;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod ranking;
pub mod rpc;
pub mod worker;

pub use codec::{CodecError, CodecResult};
pub use config::{AiMode, Config, ConfigError};
pub use embedding::{FallbackEmbedder, deterministic_embed};
#[cfg(any(test, feature = "mock"))]
pub use ranking::MockBackend;
pub use ranking::{
    Candidate, RankConfig, RankOptions, RankSession, RankTimings, RelevanceBackend,
    cosine_from_blob, cosine_to_score, rank_candidates,
};
pub use rpc::{RpcError, RpcResult};
pub use worker::{
    BackendKind, LlamaBackend, LlamaConfig, Outcome, WorkerConfig, WorkerError, WorkerHandle,
    WorkerMode, WorkerResult, WorkerState,
};

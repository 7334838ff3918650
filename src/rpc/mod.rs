//! RPC channel between the supervisor and an inference backend.
//!
//! Two transports share the same operations (`health`, `embed`, `rerank`):
//!
//! - [`stdio`]: newline-delimited JSON over a persistent worker's pipes
//!   (see [`protocol`] for the message shapes).
//! - [`http`]: independent loopback requests to a llama-server style process.
//!
//! [`server`] is the worker half of the stdio protocol, used by `qx-worker`.

pub mod error;
pub mod http;
pub mod protocol;
pub mod server;
pub mod stdio;


pub use error::{RpcError, RpcResult};
pub use http::{HttpChannel, RERANK_GRAMMAR, parse_rerank_content, rerank_prompt};
pub use protocol::{IncomingRequest, Op, Request, Response};
pub use server::{ServeBackend, ServeExit, serve, write_response};
pub use stdio::{ChildChannel, StdioChannel};

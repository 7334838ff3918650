use std::time::Duration;
use thiserror::Error;

use super::protocol::Op;

#[derive(Debug, Error)]
/// Errors raised while exchanging a request with a backend.
pub enum RpcError {
    /// No response arrived within the per-call window.
    #[error("{op} request timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out.
        op: Op,
        /// Window that elapsed.
        timeout: Duration,
    },

    /// The worker closed its output stream (zero-length read).
    #[error("worker exited")]
    WorkerExited,

    /// Pipe-level failure (typically a broken pipe to a dead worker).
    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered `ok: false`.
    #[error("backend error: {message}")]
    Backend {
        /// Message reported by the backend.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("malformed {op} response: {reason}")]
    Malformed {
        /// Operation whose response was malformed.
        op: Op,
        /// What was wrong.
        reason: String,
    },

    /// HTTP transport failure.
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        /// Request URL.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// Status code.
        status: u16,
    },

    /// Request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RpcError {
    /// Returns `true` when the peer is gone and the channel cannot be reused.
    ///
    /// For HTTP this is a refused or dropped connection, not a slow server.
    pub fn is_channel_failure(&self) -> bool {
        match self {
            RpcError::WorkerExited | RpcError::Io(_) => true,
            RpcError::Http { source, .. } => {
                (source.is_connect() || source.is_request()) && !source.is_timeout()
            }
            _ => false,
        }
    }

    /// Returns `true` for per-call timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }

    /// Returns `true` when the backend replied but the value is unusable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, RpcError::Malformed { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

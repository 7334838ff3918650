use thiserror::Error;

use super::types::WorkerMode;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
/// Errors surfaced by the worker supervisor.
pub enum WorkerError {
    /// A backend process could not be launched or never became ready.
    #[error("backend startup failed: {reason}")]
    StartupFailed {
        /// What went wrong.
        reason: String,
    },

    /// The handle was shut down explicitly and will not restart.
    #[error("{mode} worker has been shut down")]
    Stopped {
        /// Mode of the stopped handle.
        mode: WorkerMode,
    },

    /// The call itself failed (after the single restart, where applicable).
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl WorkerError {
    pub(crate) fn startup(reason: impl Into<String>) -> Self {
        WorkerError::StartupFailed {
            reason: reason.into(),
        }
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;

//! Error types for code execution

use std::time::Duration;
use thiserror::Error;

/// Code execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to start worker: {0}")]
    SpawnError(String),

    #[error("ROOT unavailable: {0}")]
    RootUnavailable(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("Execution timed out after {}s", .limit.as_secs())]
    Timeout {
        limit: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Worker exited unexpectedly: {reason}")]
    WorkerExited {
        reason: String,
        stdout: String,
        stderr: String,
    },
}

impl ExecutionError {
    /// Whether the worker that produced this error is gone
    pub fn loses_worker(&self) -> bool {
        matches!(
            self,
            ExecutionError::Timeout { .. } | ExecutionError::WorkerExited { .. }
        )
    }
}

// Convert from IPC errors
impl From<root_mcp_ipc::IpcError> for ExecutionError {
    fn from(err: root_mcp_ipc::IpcError) -> Self {
        Self::IpcError(err.to_string())
    }
}

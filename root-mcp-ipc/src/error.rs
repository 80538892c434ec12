//! IPC error types

use thiserror::Error;

/// Failures talking to the interpreter worker
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Cannot encode worker request: {0}")]
    Encode(String),

    /// The boundary line did not carry a readable reply
    #[error("Malformed worker reply: {0}")]
    Decode(String),

    /// Reading one of the worker's pipes failed
    #[error("Worker pipe error: {0}")]
    Pipe(String),

    #[error("Worker speaks IPC protocol {actual}, expected {expected}")]
    VersionMismatch { expected: u32, actual: u32 },
}

impl IpcError {
    /// Whether the worker on the other end can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(self, IpcError::Decode(_) | IpcError::VersionMismatch { .. })
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::Pipe(err.to_string())
    }
}

//! IPC protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::IpcError;

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the server to the interpreter worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Run Python code in the persistent session globals
    ExecutePython { correlation_id: Uuid, code: String },

    /// Hand C++ code to `gInterpreter.Declare`
    DeclareCpp { correlation_id: Uuid, code: String },

    /// Hand C++ code to `gInterpreter.ProcessLine`
    ProcessLineCpp { correlation_id: Uuid, code: String },

    /// Health check ping
    Ping { correlation_id: Uuid },

    /// Shutdown signal
    Shutdown,
}

impl WorkerRequest {
    /// Correlation id of the request, `None` for shutdown
    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            WorkerRequest::ExecutePython { correlation_id, .. }
            | WorkerRequest::DeclareCpp { correlation_id, .. }
            | WorkerRequest::ProcessLineCpp { correlation_id, .. }
            | WorkerRequest::Ping { correlation_id } => Some(*correlation_id),
            WorkerRequest::Shutdown => None,
        }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::ExecutePython { .. } => "execute_python",
            WorkerRequest::DeclareCpp { .. } => "declare_cpp",
            WorkerRequest::ProcessLineCpp { .. } => "process_line_cpp",
            WorkerRequest::Ping { .. } => "ping",
            WorkerRequest::Shutdown => "shutdown",
        }
    }
}

/// Messages sent from the interpreter worker back to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    /// Worker finished booting
    Ready(RuntimeInfo),

    /// A code request ran to completion (successfully or not)
    Completed {
        correlation_id: Uuid,
        outcome: WorkerOutcome,
    },

    /// Health check response
    Pong { correlation_id: Uuid },

    /// The worker could not handle a message
    Error {
        #[serde(default)]
        correlation_id: Option<Uuid>,
        message: String,
    },
}

impl WorkerReply {
    /// Correlation id carried by the reply, if any
    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            WorkerReply::Completed { correlation_id, .. } | WorkerReply::Pong { correlation_id } => {
                Some(*correlation_id)
            }
            WorkerReply::Error { correlation_id, .. } => *correlation_id,
            WorkerReply::Ready(_) => None,
        }
    }
}

/// Interpreter versions reported by a freshly started worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub pid: u32,
    pub python_version: String,
    #[serde(default)]
    pub root_version: Option<String>,
}

impl RuntimeInfo {
    /// Whether PyROOT could be imported in the worker
    pub fn has_root(&self) -> bool {
        self.root_version.is_some()
    }
}

/// What the interpreter reported for one code request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl WorkerOutcome {
    /// Create a successful outcome
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
            error_type: None,
        }
    }

    /// Create a failed outcome
    pub fn failure(error: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            error_type: Some(error_type.into()),
        }
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            return write!(f, "ok");
        }
        match (&self.error_type, &self.error) {
            (Some(kind), Some(error)) => write!(f, "{}: {}", kind, error),
            (None, Some(error)) => write!(f, "{}", error),
            (Some(kind), None) => write!(f, "{}", kind),
            (None, None) => write!(f, "failed"),
        }
    }
}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Create a new message envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }
}

/// Serialize an envelope as one newline-terminated JSON line
pub fn encode_line<T: Serialize>(envelope: &MessageEnvelope<T>) -> Result<String, IpcError> {
    let json = serde_json::to_string(envelope)
        .map_err(|e| IpcError::Encode(e.to_string()))?;
    Ok(format!("{}\n", json))
}

/// Parse the reply carried on a stdout boundary line
pub fn decode_reply(trailer: &str) -> Result<MessageEnvelope<WorkerReply>, IpcError> {
    let envelope: MessageEnvelope<WorkerReply> = serde_json::from_str(trailer.trim())
        .map_err(|e| IpcError::Decode(e.to_string()))?;

    if !envelope.is_compatible() {
        return Err(IpcError::VersionMismatch {
            expected: IPC_PROTOCOL_VERSION,
            actual: envelope.protocol_version,
        });
    }

    Ok(envelope)
}

//! Inter-process communication for root-mcp
//!
//! This crate provides the message protocol spoken with the interpreter worker
//! and the reader that splits the worker's captured output streams into
//! per-request segments.

pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::IpcError;
pub use protocol::{
    decode_reply, encode_line, MessageEnvelope, RuntimeInfo, WorkerOutcome, WorkerReply,
    WorkerRequest, IPC_PROTOCOL_VERSION,
};
pub use transport::{Segment, SegmentReader};

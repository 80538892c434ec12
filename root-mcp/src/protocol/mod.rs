//! Wire types: JSON-RPC envelopes and the MCP payloads inside them

pub mod jsonrpc;
pub mod messages;

pub use jsonrpc::{JsonRpcError, JsonRpcErrorCode, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use messages::{
    Implementation, InitializeParams, InitializeResult, ServerCapabilities, Tool, ToolContent,
    ToolsCallParams, ToolsCallResult, ToolsCapability, ToolsListParams, ToolsListResult,
};

/// Protocol revisions this server speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Newest supported protocol revision
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Pick the revision to answer `initialize` with.
///
/// A supported request is echoed back; anything else gets the latest revision
/// and the client decides whether it can continue.
pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|v| *v == requested)
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

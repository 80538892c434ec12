//! Model Context Protocol (MCP) server for CERN ROOT
//!
//! Exposes two tools over stdio JSON-RPC: `root_python` runs Python with
//! PyROOT in scope and `root_cpp` hands C++ to cling. Both share one
//! persistent interpreter session hosted by `root-mcp-execution`.

pub mod error;
pub mod protocol;
pub mod server;

pub use error::{McpError, McpResult};
pub use server::{
    McpRequestHandler, McpServer, McpTool, RootToolRegistry, ToolExecutionContext, ToolRegistry,
};

//! Server-side failures and their JSON-RPC error codes

use thiserror::Error;

use crate::protocol::JsonRpcError;

pub type McpResult<T> = Result<T, McpError>;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("stdio transport failed: {0}")]
    Transport(#[from] std::io::Error),

    #[error("could not encode response: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not a valid JSON-RPC 2.0 message: {details}")]
    InvalidJsonRpc { details: String },

    /// A request other than `initialize` came first
    #[error("server has not been initialized")]
    NotInitialized,

    #[error("unknown method '{method}'")]
    MethodNotFound { method: String },

    #[error("bad parameters for {method}: {details}")]
    InvalidParams { method: String, details: String },

    #[error("no tool named '{tool_name}'")]
    ToolNotFound { tool_name: String },

    #[error("{message}")]
    Internal { message: String },
}

impl McpError {
    pub fn tool_not_found(tool_name: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool_name: tool_name.into(),
        }
    }

    pub fn invalid_params(method: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidParams {
            method: method.into(),
            details: details.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The error object sent back in place of a result
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        match self {
            McpError::InvalidJsonRpc { details } => {
                JsonRpcError::invalid_request(Some(details.clone()))
            }
            McpError::NotInitialized => JsonRpcError::server_not_initialized(),
            McpError::MethodNotFound { method } => JsonRpcError::method_not_found(method),
            McpError::InvalidParams { details, .. } => JsonRpcError::invalid_params(details.clone()),
            McpError::ToolNotFound { tool_name } => {
                JsonRpcError::invalid_params(format!("Tool not found: {}", tool_name))
            }
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

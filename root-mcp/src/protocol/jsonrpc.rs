//! JSON-RPC 2.0 envelopes as exchanged on the MCP stdio transport

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// A request, or a notification when `id` is absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,

    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::new(method, params, None)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// The id rendered for logs; string ids lose their quotes
    pub fn id_as_string(&self) -> Option<String> {
        self.id.as_ref().map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Reply to a request. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Serialized as `null` when the request id could not be recovered
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(error: JsonRpcError, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// Error codes this server can answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum JsonRpcErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    /// MCP: a request other than `initialize` arrived first
    ServerNotInitialized = -32002,
}

impl JsonRpcErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Standard message text for the code
    pub fn message(self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerNotInitialized => "Server not initialized",
        }
    }

    /// Codes reserved for implementation-defined server errors
    pub fn is_server_error(code: i32) -> bool {
        (-32099..=-32000).contains(&code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,

    pub message: String,

    /// Detail for humans; always a string here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    fn with_detail(code: JsonRpcErrorCode, detail: Option<String>) -> Self {
        Self::new(code.code(), code.message(), detail.map(Value::String))
    }

    pub fn parse_error(detail: Option<String>) -> Self {
        Self::with_detail(JsonRpcErrorCode::ParseError, detail)
    }

    pub fn invalid_request(detail: Option<String>) -> Self {
        Self::with_detail(JsonRpcErrorCode::InvalidRequest, detail)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::with_detail(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("Method '{}' not found", method)),
        )
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::with_detail(JsonRpcErrorCode::InvalidParams, Some(detail.into()))
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::with_detail(JsonRpcErrorCode::InternalError, Some(detail.into()))
    }

    pub fn server_not_initialized() -> Self {
        Self::with_detail(
            JsonRpcErrorCode::ServerNotInitialized,
            Some("Send 'initialize' before using tools".to_string()),
        )
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)?;
        if let Some(Value::String(detail)) = &self.data {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}

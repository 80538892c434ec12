//! MCP server implementation for exposing the ROOT interpreter to LLMs

pub mod handler;
pub mod tools;

pub use handler::McpRequestHandler;
pub use tools::{McpTool, RootToolRegistry, ToolExecutionContext, ToolRegistry};

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use root_mcp_config::McpConfig;
use root_mcp_execution::CodeExecutor;

use crate::protocol::{
    negotiate_protocol_version, Implementation, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ToolsCapability, JSONRPC_VERSION,
};
use crate::{McpError, McpResult};

const OUTBOUND_QUEUE: usize = 64;

const INSTRUCTIONS: &str = "Use root_python to run Python with the ROOT module already imported, \
and root_cpp to run C++ through cling. Both share one persistent session, so histograms, \
files and declarations survive between calls. Results report ok, stdout, stderr, error and \
error_type.";

/// MCP server speaking newline-delimited JSON-RPC
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration
    config: McpConfig,

    /// Handler for the tool methods
    handler: McpRequestHandler,

    /// Executor to stop once the client goes away
    executor: Option<Arc<dyn CodeExecutor>>,

    /// Set by the first `initialize` request
    initialized: Arc<RwLock<bool>>,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(config: McpConfig, tool_registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            config,
            handler: McpRequestHandler::new(tool_registry),
            executor: None,
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Shut `executor` down when the transport closes
    pub fn with_executor(mut self, executor: Arc<dyn CodeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// Serve the protocol on the process's stdin and stdout
    pub async fn run_stdio(&self) -> McpResult<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// Requests run in their own tasks so a long execution does not hold up
    /// `ping`; every response goes through a single writer task.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(OUTBOUND_QUEUE);
        let writer_task = tokio::spawn(Self::write_responses(writer, rx));

        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        let mut request_count: u64 = 0;

        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => {
                    info!("Received EOF on stdin, shutting down MCP server");
                    break;
                }
                Ok(bytes_read) => {
                    request_count += 1;
                    debug!("Received MCP message #{} ({} bytes)", request_count, bytes_read);

                    if let Some(response) = self.dispatch_line(&buffer, &tx).await {
                        if tx.send(response).await.is_err() {
                            warn!("Response writer has stopped; closing the transport");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
            }
        }

        // The writer drains once every in-flight request has dropped its sender
        drop(tx);
        let written = writer_task
            .await
            .map_err(|e| McpError::internal(format!("Response writer panicked: {}", e)))?;

        info!("MCP server loop terminated after {} messages", request_count);

        if let Some(executor) = &self.executor {
            if let Err(e) = executor.shutdown().await {
                warn!("Failed to stop the interpreter cleanly: {}", e);
            }
        }

        written
    }

    /// Handle one raw line; slow requests are spawned and answer through `tx`
    async fn dispatch_line(
        &self,
        raw: &[u8],
        tx: &mpsc::Sender<JsonRpcResponse>,
    ) -> Option<JsonRpcResponse> {
        if raw.len() > self.config.max_message_size {
            warn!(
                "Rejecting {} byte message (limit {})",
                raw.len(),
                self.config.max_message_size
            );
            return Some(JsonRpcResponse::error(
                JsonRpcError::invalid_request(Some(format!(
                    "Message exceeds {} bytes",
                    self.config.max_message_size
                ))),
                None,
            ));
        }

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    JsonRpcError::parse_error(Some(e.to_string())),
                    None,
                ))
            }
        };
        if line.is_empty() {
            return None;
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(e) => return Some(Self::parse_failure(&e)),
        };

        // initialize and notifications are cheap and must stay in order
        let inline = value.get("id").is_none()
            || value.get("method").and_then(Value::as_str) == Some("initialize");
        if inline {
            return self.handle_value(value).await;
        }

        let server = self.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle_value(value).await {
                if tx.send(response).await.is_err() {
                    debug!("Dropping response; the transport is closed");
                }
            }
        });
        None
    }

    async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> McpResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(response) = rx.recv().await {
            let response_json = serde_json::to_string(&response)?;
            debug!("Sending MCP response: {}", response_json);
            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }

    /// Handle an incoming message; `None` means nothing is sent back
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(message) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => Some(Self::parse_failure(&e)),
        }
    }

    fn parse_failure(err: &serde_json::Error) -> JsonRpcResponse {
        JsonRpcResponse::error(
            JsonRpcError::parse_error(Some(format!(
                "Failed to parse JSON-RPC message: {}",
                err
            ))),
            None,
        )
    }

    async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        // Replies to server-initiated requests; this server never sends any
        if value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some())
        {
            debug!("Ignoring JSON-RPC response from client");
            return None;
        }

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                let error = McpError::InvalidJsonRpc {
                    details: e.to_string(),
                };
                return Some(JsonRpcResponse::error(error.to_json_rpc_error(), id));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            let error = McpError::InvalidJsonRpc {
                details: format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
            };
            return Some(JsonRpcResponse::error(error.to_json_rpc_error(), request.id));
        }

        self.handle_request(request).await
    }

    /// Handle a JSON-RPC request
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.handle_notification(&request).await;
            return None;
        }

        let request_id = request.id.clone();
        let method = request.method.clone();
        match self.process_request(request).await {
            Ok(result) => Some(JsonRpcResponse::success(result, request_id)),
            Err(e) => {
                debug!("Request {} failed: {}", method, e);
                Some(JsonRpcResponse::error(e.to_json_rpc_error(), request_id))
            }
        }
    }

    /// Process a request (not a notification)
    async fn process_request(&self, request: JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => {
                let params: InitializeParams = match request.params {
                    Some(params) => serde_json::from_value(params)
                        .map_err(|e| McpError::invalid_params("initialize", e.to_string()))?,
                    None => {
                        return Err(McpError::invalid_params(
                            "initialize",
                            "Missing initialization parameters",
                        ))
                    }
                };

                let result = self.handle_initialize(params).await;
                Ok(serde_json::to_value(result)?)
            }

            "ping" => Ok(json!({})),

            "tools/list" => {
                self.ensure_initialized().await?;
                self.handler.handle_tools_list(request.params).await
            }

            "tools/call" => {
                self.ensure_initialized().await?;
                let request_id = request.id_as_string();
                self.handler
                    .handle_tools_call(request.params, request_id)
                    .await
            }

            method => Err(McpError::MethodNotFound {
                method: method.to_string(),
            }),
        }
    }

    async fn ensure_initialized(&self) -> McpResult<()> {
        if self.is_initialized().await {
            Ok(())
        } else {
            Err(McpError::NotInitialized)
        }
    }

    /// Handle a notification (no response expected)
    async fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => {
                if self.is_initialized().await {
                    debug!("Client confirmed initialization");
                } else {
                    // Some clients skip the request and only notify
                    *self.initialized.write().await = true;
                    info!("MCP server initialized via notification");
                }
            }
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            method => {
                warn!("Ignoring notification: {}", method);
            }
        }
    }

    /// Handle initialize request
    async fn handle_initialize(&self, params: InitializeParams) -> InitializeResult {
        let protocol_version = negotiate_protocol_version(&params.protocol_version);
        info!(
            "Initializing MCP server for client {} (requested protocol {}, using {})",
            params
                .client_info
                .as_ref()
                .map(|c| c.name.as_str())
                .unwrap_or("<unknown>"),
            params.protocol_version,
            protocol_version
        );

        *self.initialized.write().await = true;

        InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: Implementation::new(
                self.config.server_name.clone(),
                env!("CARGO_PKG_VERSION"),
            ),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Tool, ToolsCallResult};
    use async_trait::async_trait;

    struct EmptyRegistry;

    #[async_trait]
    impl ToolRegistry for EmptyRegistry {
        async fn list_tools(&self) -> McpResult<Vec<Tool>> {
            Ok(Vec::new())
        }

        async fn get_tool(&self, _name: &str) -> McpResult<Option<McpTool>> {
            Ok(None)
        }

        async fn execute_tool(
            &self,
            name: &str,
            _execution_context: ToolExecutionContext,
        ) -> McpResult<ToolsCallResult> {
            Err(McpError::tool_not_found(name))
        }
    }

    fn create_test_server() -> McpServer {
        McpServer::new(McpConfig::default(), Arc::new(EmptyRegistry))
    }

    async fn initialize(server: &McpServer) {
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            )
            .await
            .unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = create_test_server();
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test","version":"1"}}}"#,
            )
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "root-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(response.id, Some(json!(1)));
        assert!(server.is_initialized().await);
    }

    #[tokio::test]
    async fn test_unknown_protocol_version_gets_latest() {
        let server = create_test_server();
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1.0.0"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(
            response.result.unwrap()["protocolVersion"],
            crate::protocol::LATEST_PROTOCOL_VERSION
        );
    }

    #[tokio::test]
    async fn test_initialize_without_params() {
        let response = create_test_server()
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tools_before_initialize() {
        let server = create_test_server();
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32002);
        assert_eq!(response.id, Some(json!("a")));

        initialize(&server).await;
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":"b","method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.result.unwrap(), json!({"tools": []}));
    }

    #[tokio::test]
    async fn test_initialized_notification_alone() {
        let server = create_test_server();
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
        assert!(server.is_initialized().await);
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let response = create_test_server()
            .handle_message("{not json")
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32700);
        assert_eq!(response.id, None);
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_id() {
        let server = create_test_server();

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":7}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
        assert_eq!(response.id, Some(json!(5)));

        let response = server
            .handle_message(r#"{"jsonrpc":"1.0","id":6,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32600);

        let response = server.handle_message("[1, 2]").await.unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_ping_and_unknown_method() {
        let server = create_test_server();

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(response.result.unwrap(), json!({}));

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_client_responses_are_ignored() {
        let response = create_test_server()
            .handle_message(r#"{"jsonrpc":"2.0","id":9,"result":{}}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected() {
        let config = McpConfig {
            max_message_size: 32,
            ..McpConfig::default()
        };
        let server = McpServer::new(config, Arc::new(EmptyRegistry));
        let (tx, _rx) = mpsc::channel(1);

        let line = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#,
            "x".repeat(64)
        );
        let response = server.dispatch_line(line.as_bytes(), &tx).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
        assert_eq!(response.id, None);
    }
}

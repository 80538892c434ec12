//! `tools/list` and `tools/call`, decoded and forwarded to the registry

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::tools::{ToolExecutionContext, ToolRegistry};
use crate::protocol::{ToolsCallParams, ToolsListParams, ToolsListResult};
use crate::{McpError, McpResult};

/// Turns raw `params` into registry calls and results back into JSON
#[derive(Clone)]
pub struct McpRequestHandler {
    tool_registry: Arc<dyn ToolRegistry>,
}

impl McpRequestHandler {
    pub fn new(tool_registry: Arc<dyn ToolRegistry>) -> Self {
        Self { tool_registry }
    }

    /// Always a single page
    pub async fn handle_tools_list(&self, params: Option<Value>) -> McpResult<Value> {
        if let Some(params) = params.filter(|p| !p.is_null()) {
            let params: ToolsListParams = serde_json::from_value(params)
                .map_err(|e| McpError::invalid_params("tools/list", e.to_string()))?;
            if params.cursor.is_some() {
                debug!("Ignoring tools/list cursor; all tools fit in one page");
            }
        }

        let result = ToolsListResult {
            tools: self.tool_registry.list_tools().await?,
            next_cursor: None,
        };

        Ok(serde_json::to_value(result)?)
    }

    pub async fn handle_tools_call(
        &self,
        params: Option<Value>,
        request_id: Option<String>,
    ) -> McpResult<Value> {
        let params: ToolsCallParams = serde_json::from_value(
            params.ok_or_else(|| McpError::invalid_params("tools/call", "Missing parameters"))?,
        )
        .map_err(|e| McpError::invalid_params("tools/call", e.to_string()))?;

        let started = Instant::now();
        let context = ToolExecutionContext {
            arguments: params.arguments,
            request_id,
        };

        let result = self
            .tool_registry
            .execute_tool(&params.name, context)
            .await?;

        debug!(
            "Tool {} finished in {}ms (isError: {})",
            params.name,
            started.elapsed().as_millis(),
            result.is_error
        );

        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Tool, ToolContent, ToolsCallResult};
    use crate::server::McpTool;
    use async_trait::async_trait;
    use serde_json::json;

    /// Registry with a single `echo` tool
    struct EchoRegistry;

    #[async_trait]
    impl ToolRegistry for EchoRegistry {
        async fn list_tools(&self) -> McpResult<Vec<Tool>> {
            Ok(vec![Tool {
                name: "echo".to_string(),
                description: "Echo the arguments".to_string(),
                input_schema: json!({"type": "object"}),
            }])
        }

        async fn get_tool(&self, name: &str) -> McpResult<Option<McpTool>> {
            Ok((name == "echo").then(|| McpTool::new("echo", "Echo the arguments", json!({}))))
        }

        async fn execute_tool(
            &self,
            name: &str,
            execution_context: ToolExecutionContext,
        ) -> McpResult<ToolsCallResult> {
            if name != "echo" {
                return Err(McpError::tool_not_found(name));
            }
            Ok(ToolsCallResult {
                content: vec![ToolContent::text(
                    execution_context.arguments.unwrap_or(Value::Null).to_string(),
                )],
                structured_content: None,
                is_error: false,
            })
        }
    }

    fn handler() -> McpRequestHandler {
        McpRequestHandler::new(Arc::new(EchoRegistry))
    }

    #[tokio::test]
    async fn test_handle_tools_list() {
        let value = handler().handle_tools_list(None).await.unwrap();
        assert_eq!(value["tools"][0]["name"], "echo");
        assert!(value.get("nextCursor").is_none());

        let value = handler()
            .handle_tools_list(Some(json!({"cursor": "abc"})))
            .await
            .unwrap();
        assert_eq!(value["tools"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_tools_call() {
        let value = handler()
            .handle_tools_call(
                Some(json!({"name": "echo", "arguments": {"code": "1"}})),
                Some("3".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(value["isError"], false);
        assert_eq!(value["content"][0]["text"], r#"{"code":"1"}"#);
    }

    #[tokio::test]
    async fn test_handle_tools_call_missing_params() {
        let err = handler().handle_tools_call(None, None).await.unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));

        let err = handler()
            .handle_tools_call(Some(json!({"arguments": {}})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn test_handle_tools_call_invalid_tool() {
        let err = handler()
            .handle_tools_call(Some(json!({"name": "nope"})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound { .. }));
    }
}

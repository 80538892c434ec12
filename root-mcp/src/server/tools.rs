//! Tool registry and definitions for MCP server

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use root_mcp_config::CppMode;
use root_mcp_execution::{error_types, CodeExecutor, ExecutionError, ExecutionResult};
use root_mcp_logging::{code_listing, outcome_report, Outcome};

use crate::protocol::{Tool, ToolContent, ToolsCallResult};
use crate::{McpError, McpResult};

const CALL_METHOD: &str = "tools/call";

/// MCP tool definition with execution capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool metadata
    pub tool: Tool,

    /// Extra names accepted by `tools/call` but never listed
    pub aliases: Vec<String>,
}

impl McpTool {
    /// Create a new MCP tool
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            tool: Tool {
                name: name.into(),
                description: description.into(),
                input_schema,
            },
            aliases: Vec::new(),
        }
    }

    /// Accept another name for this tool
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.tool.name
    }

    /// Whether `name` refers to this tool
    pub fn answers_to(&self, name: &str) -> bool {
        self.tool.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// Tool execution context
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Tool arguments
    pub arguments: Option<Value>,

    /// Request correlation ID
    pub request_id: Option<String>,
}

/// Tool registry trait for managing available tools
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// List all advertised tools
    async fn list_tools(&self) -> McpResult<Vec<Tool>>;

    /// Get a specific tool by name or alias
    async fn get_tool(&self, name: &str) -> McpResult<Option<McpTool>>;

    /// Execute a tool
    async fn execute_tool(
        &self,
        name: &str,
        execution_context: ToolExecutionContext,
    ) -> McpResult<ToolsCallResult>;
}

/// Code the client asked to run, with its language-specific options
#[derive(Debug, Clone, PartialEq, Eq)]
enum CodeRequest {
    Python { code: String },
    Cpp { code: String, mode: Option<CppMode> },
}

impl CodeRequest {
    fn code(&self) -> &str {
        match self {
            CodeRequest::Python { code } | CodeRequest::Cpp { code, .. } => code,
        }
    }

    fn language(&self) -> &'static str {
        match self {
            CodeRequest::Python { .. } => "python",
            CodeRequest::Cpp { .. } => "c++",
        }
    }
}

/// The two code execution tools backed by a [`CodeExecutor`]
pub struct RootToolRegistry {
    tools: Vec<McpTool>,
    executor: Arc<dyn CodeExecutor>,
    echo_code: bool,
}

impl RootToolRegistry {
    pub const PYTHON_TOOL: &'static str = "root_python";
    pub const CPP_TOOL: &'static str = "root_cpp";

    /// Create the registry; `echo_code` logs every snippet and its outcome
    pub fn new(executor: Arc<dyn CodeExecutor>, echo_code: bool) -> Self {
        Self {
            tools: Self::builtin_tools(),
            executor,
            echo_code,
        }
    }

    fn builtin_tools() -> Vec<McpTool> {
        let python = McpTool::new(
            Self::PYTHON_TOOL,
            "Execute Python code with PyROOT available in scope.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python source to execute"
                    }
                },
                "required": ["code"]
            }),
        )
        .with_alias("run_python");

        let cpp = McpTool::new(
            Self::CPP_TOOL,
            "Execute C++ code via ROOT's cling interpreter.",
            json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "C++ source to execute"
                    },
                    "mode": {
                        "type": "string",
                        "enum": CppMode::CHOICES,
                        "description": "auto tries Declare then ProcessLine; declare is for \
                                        definitions; process_line is for statements"
                    }
                },
                "required": ["code"]
            }),
        )
        .with_alias("run_cpp");

        vec![python, cpp]
    }

    fn resolve(&self, name: &str) -> Option<&McpTool> {
        self.tools.iter().find(|tool| tool.answers_to(name))
    }

    /// Validate the arguments for a tool call
    fn parse_request(tool: &McpTool, arguments: Option<Value>) -> McpResult<CodeRequest> {
        let arguments = match arguments {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(McpError::invalid_params(
                    CALL_METHOD,
                    "Tool arguments must be an object",
                ))
            }
        };

        let code = match arguments.get("code") {
            Some(Value::String(code)) => code.clone(),
            Some(_) => {
                return Err(McpError::invalid_params(
                    CALL_METHOD,
                    "Argument 'code' must be a string",
                ))
            }
            None => {
                return Err(McpError::invalid_params(
                    CALL_METHOD,
                    "Missing required argument 'code'",
                ))
            }
        };

        if tool.name() == Self::PYTHON_TOOL {
            return Ok(CodeRequest::Python { code });
        }

        let mode = match arguments.get("mode") {
            None | Some(Value::Null) => None,
            Some(Value::String(mode)) => Some(
                mode.parse::<CppMode>()
                    .map_err(|e| McpError::invalid_params(CALL_METHOD, e))?,
            ),
            Some(_) => {
                return Err(McpError::invalid_params(
                    CALL_METHOD,
                    "Argument 'mode' must be a string",
                ))
            }
        };

        Ok(CodeRequest::Cpp { code, mode })
    }

    async fn run(&self, request: &CodeRequest) -> Result<ExecutionResult, ExecutionError> {
        match request {
            CodeRequest::Python { code } => self.executor.run_python(code).await,
            CodeRequest::Cpp { code, mode } => self.executor.run_cpp(code, *mode).await,
        }
    }

    /// Report an infrastructure failure the same way as a failed run
    fn infrastructure_failure(err: &ExecutionError) -> ExecutionResult {
        let error_type = match err {
            ExecutionError::RootUnavailable(_) => error_types::ROOT_UNAVAILABLE,
            ExecutionError::SpawnError(_) => "WorkerStartError",
            _ => "ExecutionError",
        };
        ExecutionResult::failure(err.to_string(), error_type, String::new(), String::new())
    }

    fn call_result(result: &ExecutionResult) -> McpResult<ToolsCallResult> {
        Ok(ToolsCallResult {
            content: vec![ToolContent::text(serde_json::to_string_pretty(result)?)],
            structured_content: Some(serde_json::to_value(result)?),
            is_error: !result.ok,
        })
    }
}

#[async_trait]
impl ToolRegistry for RootToolRegistry {
    async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        Ok(self.tools.iter().map(|t| t.tool.clone()).collect())
    }

    async fn get_tool(&self, name: &str) -> McpResult<Option<McpTool>> {
        Ok(self.resolve(name).cloned())
    }

    async fn execute_tool(
        &self,
        name: &str,
        execution_context: ToolExecutionContext,
    ) -> McpResult<ToolsCallResult> {
        let tool = self
            .resolve(name)
            .ok_or_else(|| McpError::tool_not_found(name))?;
        let request = Self::parse_request(tool, execution_context.arguments)?;

        if self.echo_code {
            info!("{}", code_listing(request.language(), request.code()));
        }

        let result = match self.run(&request).await {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    "{} call {} failed: {}",
                    tool.name(),
                    execution_context.request_id.as_deref().unwrap_or("-"),
                    err
                );
                Self::infrastructure_failure(&err)
            }
        };

        if self.echo_code {
            info!(
                "{}",
                outcome_report(&Outcome {
                    ok: result.ok,
                    error: result.error.as_deref(),
                    error_type: result.error_type.as_deref(),
                    stdout: &result.stdout,
                    stderr: &result.stderr,
                })
            );
        }

        Self::call_result(&result)
    }
}

//! Protocol-facing settings

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// Reported as `serverInfo.name` during `initialize`
    pub server_name: String,

    /// Only "stdio" exists
    pub transport: String,

    /// Longest accepted request line, in bytes
    pub max_message_size: usize,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_name: "root-mcp".into(),
            transport: "stdio".into(),
            max_message_size: 1 << 20,
        }
    }
}

impl Validatable for McpConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.require_non_empty("server_name", &self.server_name)?;
        self.require_one_of("transport", &self.transport, &["stdio"])?;
        self.require_positive("max_message_size", self.max_message_size)
    }

    fn domain_name(&self) -> &'static str {
        "mcp"
    }
}

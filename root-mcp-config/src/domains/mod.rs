//! Configuration domains

pub mod execution;
pub mod logging;
pub mod mcp;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Complete root-mcp configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RootMcpConfig {
    /// Interpreter worker configuration
    pub execution: execution::ExecutionConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// MCP server configuration
    pub mcp: mcp::McpConfig,
}

impl RootMcpConfig {
    /// Validate all configuration domains
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.execution.validate()?;
        self.logging.validate()?;
        self.mcp.validate()?;
        Ok(())
    }

    /// Render the default configuration as YAML
    pub fn generate_sample() -> ConfigResult<String> {
        let body = serde_yaml::to_string(&Self::default())?;
        Ok(format!(
            "# root-mcp configuration\n# Values shown are the defaults. Environment variables with the\n# ROOT_MCP_ prefix override them at startup.\n{}",
            body
        ))
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate_all()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_default_config_is_valid() {
        let config = RootMcpConfig::default();
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = RootMcpConfig::generate_sample().unwrap();
        assert!(sample.starts_with("# root-mcp configuration"));

        let parsed = RootMcpConfig::from_yaml(&sample).unwrap();
        assert_eq!(parsed.execution.python, "python3");
        assert_eq!(parsed.mcp.server_name, "root-mcp");
    }

    #[test]
    fn test_invalid_domain_is_reported_by_name() {
        let err = RootMcpConfig::from_yaml("execution:\n  timeout: 0\n").unwrap_err();
        match err {
            ConfigError::DomainError { domain, .. } => assert_eq!(domain, "execution"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `ROOT_MCP_*` override that does not parse
    #[error("Bad value in {variable}: {reason}")]
    Override { variable: String, reason: String },

    /// A value that parses but is not usable
    #[error("Invalid {domain} setting: {message}")]
    DomainError { domain: String, message: String },
}

impl ConfigError {
    /// Build a [`ConfigError::DomainError`]
    pub fn domain(domain: &str, message: impl Into<String>) -> Self {
        Self::DomainError {
            domain: domain.to_string(),
            message: message.into(),
        }
    }
}

//! Settings for the root-mcp server.
//!
//! Three sections (`execution`, `logging`, `mcp`) are read from one YAML file,
//! overridden by `ROOT_MCP_*` variables and validated before the server
//! starts. Every field has a default, so an empty file is a valid config.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::{
    execution::{CppMode, ExecutionConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    mcp::McpConfig,
    utils::serde_duration,
    RootMcpConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

//! Logging for root-mcp
//!
//! All output goes to stderr; stdout belongs to the MCP transport.

pub mod init;
pub mod listing;

pub use init::init_logging_from_config;
pub use listing::{code_listing, outcome_report, Outcome, BANNER_WIDTH};

//! ROOT execution engine
//!
//! Code runs inside a long-lived Python worker process that has PyROOT
//! imported. The worker's stdout and stderr are piped back here, so whatever
//! the interpreter prints (Python, cling, ROOT's own diagnostics) is captured
//! per request without touching this process's stdio.

pub mod error;
pub mod executor;
pub mod result;
pub mod scan;
pub mod worker;

// Re-export main types
pub use error::ExecutionError;
pub use executor::{CodeExecutor, RootExecutor, WorkerHealth};
pub use result::{error_types, ExecutionResult};
pub use scan::ErrorScanner;
pub use worker::{Exchange, RootWorker, WorkerConfig, WorkerProcessStatus};

pub use root_mcp_config::CppMode;
pub use root_mcp_ipc::RuntimeInfo;

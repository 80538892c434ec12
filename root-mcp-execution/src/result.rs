//! Structured result returned for every tool call

use root_mcp_ipc::WorkerOutcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `error_type` values produced outside the interpreter itself
pub mod error_types {
    /// A keyword scan found an interpreter diagnostic
    pub const INTERPRETER_ERROR: &str = "InterpreterError";
    /// The call exceeded the configured timeout
    pub const TIMEOUT_ERROR: &str = "TimeoutError";
    /// The worker process died while running the code
    pub const WORKER_CRASHED: &str = "WorkerCrashed";
    /// C++ was requested but PyROOT could not be imported
    pub const ROOT_UNAVAILABLE: &str = "RootUnavailableError";
}

/// Result of executing Python or C++ code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Combine what the interpreter reported with the captured streams
    pub fn from_outcome(outcome: WorkerOutcome, stdout: String, stderr: String) -> Self {
        Self {
            ok: outcome.ok,
            stdout,
            stderr,
            error: outcome.error,
            error_type: outcome.error_type,
            timed_out: false,
            duration_ms: 0,
        }
    }

    pub fn failure(
        error: impl Into<String>,
        error_type: impl Into<String>,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self {
            ok: false,
            stdout,
            stderr,
            error: Some(error.into()),
            error_type: Some(error_type.into()),
            timed_out: false,
            duration_ms: 0,
        }
    }

    pub fn timed_out(limit: Duration, stdout: String, stderr: String) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(
                format!("Execution timed out after {}s", limit.as_secs()),
                error_types::TIMEOUT_ERROR,
                stdout,
                stderr,
            )
        }
    }

    /// Mark a run as failed because of a diagnostic line in its output.
    ///
    /// Exceptions raised by the interpreter keep their own message and type.
    pub fn flag_diagnostic(&mut self, line: String) {
        let replaceable = self.ok
            || self.error_type.is_none()
            || self.error_type.as_deref() == Some(error_types::INTERPRETER_ERROR);

        self.ok = false;
        if replaceable {
            self.error = Some(line);
            self.error_type = Some(error_types::INTERPRETER_ERROR.to_string());
        }
    }

    /// Whether the worker had to be abandoned to produce this result
    pub fn lost_worker(&self) -> bool {
        self.timed_out || self.error_type.as_deref() == Some(error_types::WORKER_CRASHED)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

//! Interpreter worker configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Keywords that mark C++ interpreter output as failed
pub const DEFAULT_ERROR_KEYWORDS: &[&str] = &[
    "error:",
    "Error in <",
    "*** Break ***",
    "segmentation violation",
    "fatal error",
];

/// How C++ code is handed to the ROOT interpreter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CppMode {
    /// Try `Declare` first, fall back to `ProcessLine`
    #[default]
    Auto,
    /// Declarations only (functions, classes, globals)
    Declare,
    /// Statements and expressions, one line at a time
    ProcessLine,
}

impl CppMode {
    pub const CHOICES: &'static [&'static str] = &["auto", "declare", "process_line"];

    pub fn as_str(&self) -> &'static str {
        match self {
            CppMode::Auto => "auto",
            CppMode::Declare => "declare",
            CppMode::ProcessLine => "process_line",
        }
    }
}

impl fmt::Display for CppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(CppMode::Auto),
            "declare" => Ok(CppMode::Declare),
            "process_line" | "processline" => Ok(CppMode::ProcessLine),
            _ => Err(format!("Invalid C++ mode: {}", s)),
        }
    }
}

/// Interpreter worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Python executable used for the worker process
    pub python: String,

    /// Wall-clock limit for a single tool call
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    /// How long to wait for the worker to import ROOT and report ready
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub startup_timeout: Duration,

    /// Keep ROOT out of batch mode so canvases can open windows
    pub graphics: bool,

    /// Refuse to start when PyROOT cannot be imported
    pub require_root: bool,

    /// Respawn the worker after it dies
    pub restart_on_crash: bool,

    /// Upper bound on crash restarts for the lifetime of the server
    pub max_restarts: u32,

    /// Default mode for C++ calls that do not name one
    pub cpp_mode: CppMode,

    /// Lines containing any of these mark C++ output as failed
    pub error_keywords: Vec<String>,

    /// Apply the keyword scan to Python stderr as well
    pub scan_python_stderr: bool,

    /// Extra environment variables for the worker process
    pub env: HashMap<String, String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            timeout: Duration::from_secs(300),
            startup_timeout: Duration::from_secs(60),
            graphics: false,
            require_root: true,
            restart_on_crash: true,
            max_restarts: 3,
            cpp_mode: CppMode::Auto,
            error_keywords: DEFAULT_ERROR_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            scan_python_stderr: false,
            env: HashMap::new(),
        }
    }
}

impl Validatable for ExecutionConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.require_non_empty("python", &self.python)?;
        self.require_seconds("timeout", self.timeout)?;
        self.require_seconds("startup_timeout", self.startup_timeout)?;

        if self.error_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(self.invalid("error_keywords cannot contain empty entries"));
        }

        if let Some(key) = self.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(self.invalid(format!("env key '{}' is not a valid variable name", key)));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "execution"
    }
}

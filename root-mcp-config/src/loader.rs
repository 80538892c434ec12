//! Reads the YAML file and layers `ROOT_MCP_*` variables on top

use crate::domains::RootMcpConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const DEFAULT_PREFIX: &str = "ROOT_MCP";

/// Builds a validated [`RootMcpConfig`].
///
/// Precedence, lowest first: built-in defaults, the YAML file, environment
/// variables named `<PREFIX>_<NAME>`. Command line flags are applied by the
/// binary afterwards.
pub struct ConfigLoader {
    prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<RootMcpConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Read configuration from {}", path.display());

        self.finish(serde_yaml::from_str(&text)?)
    }

    /// Defaults plus environment; no file involved
    pub fn from_env(&self) -> ConfigResult<RootMcpConfig> {
        self.finish(RootMcpConfig::default())
    }

    pub fn load(&self, path: Option<impl AsRef<Path>>) -> ConfigResult<RootMcpConfig> {
        match path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn finish(&self, mut config: RootMcpConfig) -> ConfigResult<RootMcpConfig> {
        let env = Env {
            prefix: &self.prefix,
        };
        let exec = &mut config.execution;

        if let Some(python) = env.text("PYTHON") {
            exec.python = python;
        }
        if let Some(seconds) = env.parse::<u64>("TIMEOUT_SECONDS")? {
            exec.timeout = Duration::from_secs(seconds);
        }
        if let Some(graphics) = env.parse("GRAPHICS")? {
            exec.graphics = graphics;
        }
        if let Some(require_root) = env.parse("REQUIRE_ROOT")? {
            exec.require_root = require_root;
        }
        if let Some(mode) = env.parse("CPP_MODE")? {
            exec.cpp_mode = mode;
        }
        if let Some(level) = env.parse("LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(format) = env.parse("LOG_FORMAT")? {
            config.logging.format = format;
        }

        config.validate_all()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

struct Env<'a> {
    prefix: &'a str,
}

impl Env<'_> {
    fn key(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn text(&self, name: &str) -> Option<String> {
        let key = self.key(name);
        let value = std::env::var(&key).ok()?;
        debug!("Configuration override from {}", key);
        Some(value)
    }

    fn parse<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.text(name) else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Override {
                variable: self.key(name),
                reason: e.to_string(),
            })
    }
}

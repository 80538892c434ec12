//! Checks applied to every configuration section after loading

use std::fmt::Display;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// A configuration section that can reject its own values
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Section name as it appears in the YAML file
    fn domain_name(&self) -> &'static str;

    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::domain(self.domain_name(), message)
    }

    fn require_non_empty(&self, field: &str, value: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(self.invalid(format!("{} must not be empty", field)));
        }
        Ok(())
    }

    fn require_positive<T>(&self, field: &str, value: T) -> ConfigResult<()>
    where
        T: PartialOrd + Default + Display,
    {
        if value <= T::default() {
            return Err(self.invalid(format!("{} must be positive (got {})", field, value)));
        }
        Ok(())
    }

    /// Durations are configured in whole seconds, so anything below one is zero
    fn require_seconds(&self, field: &str, value: Duration) -> ConfigResult<()> {
        self.require_positive(field, value.as_secs())
    }

    fn require_one_of(&self, field: &str, value: &str, choices: &[&str]) -> ConfigResult<()> {
        if choices.iter().any(|c| c.eq_ignore_ascii_case(value)) {
            return Ok(());
        }
        Err(self.invalid(format!(
            "{} '{}' is not supported (expected one of: {})",
            field,
            value,
            choices.join(", ")
        )))
    }
}

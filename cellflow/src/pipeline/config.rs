//! Executor configuration.

use crate::context::timeout_from_secs;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_KEY: &str = "default_timeout_secs";

/// Settings that apply to every run of an [`Executor`](super::Executor).
///
/// Per-run options in [`RunConfig`](crate::context::RunConfig) take
/// precedence over these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout applied to stages with no run-level timeout. `None` lets
    /// stages run unbounded.
    #[serde(default)]
    pub default_timeout_secs: Option<f64>,
}

impl ExecutorConfig {
    /// Creates a config with no default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_default_timeout_secs(mut self, secs: f64) -> Self {
        self.default_timeout_secs = Some(secs);
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the default timeout is not a positive number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_timeout().map(|_| ())
    }

    /// Returns the default timeout as a duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the default timeout is not a positive number.
    pub fn default_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.default_timeout_secs
            .map(|secs| timeout_from_secs(DEFAULT_TIMEOUT_KEY, secs))
            .transpose()
    }
}

//! Tracking parameters.

use crate::context::{RunConfig, DEFAULT_MAX_DISTANCE};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

fn default_max_distance() -> f64 {
    DEFAULT_MAX_DISTANCE
}

/// Parameters of a tracking pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Largest centroid displacement, in pixels, accepted as the same cell.
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
        }
    }
}

impl TrackingConfig {
    /// Creates a config with the given threshold.
    #[must_use]
    pub fn new(max_distance: f64) -> Self {
        Self { max_distance }
    }

    /// Reads the config from run options.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_distance` has the wrong type or range.
    pub fn from_run_config(config: &RunConfig) -> Result<Self, ConfigError> {
        config.max_distance().map(Self::new)
    }

    /// Checks that the threshold is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxDistance`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_max_distance(self.max_distance)
    }
}

pub(crate) fn validate_max_distance(max_distance: f64) -> Result<(), ConfigError> {
    if max_distance.is_finite() && max_distance >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMaxDistance(max_distance))
    }
}

//! Run configuration: a flat map of option names to JSON values.

use crate::errors::ConfigError;
use crate::registry::StageId;
use crate::workflow::StageRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Option holding the tracking distance threshold, in pixels.
pub const MAX_DISTANCE_KEY: &str = "max_distance";
/// Option holding the default per-stage timeout, in seconds.
pub const STAGE_TIMEOUT_KEY: &str = "stage_timeout_secs";
/// Option holding the stage selection.
pub const STAGES_KEY: &str = "stages";

/// Default tracking distance threshold, in pixels.
pub const DEFAULT_MAX_DISTANCE: f64 = 20.0;

/// Options for one run.
///
/// Stage-specific options are namespaced by stage name, e.g.
/// `segmentation.timeout_secs` or `process_single_cell.channels`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunConfig {
    values: HashMap<String, Value>,
}

impl RunConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an option.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets an option in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the raw value of an option.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns true if the option is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Reads a numeric option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidType`] if the value is not a number.
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        self.typed(key, "a number", Value::as_f64)
    }

    /// Reads a string option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidType`] if the value is not a string.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        self.typed(key, "a string", Value::as_str)
    }

    /// Reads a boolean option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidType`] if the value is not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.typed(key, "a boolean", Value::as_bool)
    }

    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => extract(value).map(Some).ok_or_else(|| ConfigError::InvalidType {
                key: key.to_string(),
                expected,
                found: value.to_string(),
            }),
        }
    }

    /// Returns the tracking distance threshold, defaulting to 20 px.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a finite, non-negative number.
    pub fn max_distance(&self) -> Result<f64, ConfigError> {
        let value = self.get_f64(MAX_DISTANCE_KEY)?.unwrap_or(DEFAULT_MAX_DISTANCE);
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidMaxDistance(value));
        }
        Ok(value)
    }

    /// Returns the timeout for a stage: `<stage>.timeout_secs` if set,
    /// otherwise `stage_timeout_secs`, otherwise `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a positive, finite number.
    pub fn stage_timeout(&self, stage: StageId) -> Result<Option<Duration>, ConfigError> {
        let stage_key = stage_key(stage, "timeout_secs");
        let (key, secs) = match self.get_f64(&stage_key)? {
            Some(secs) => (stage_key, secs),
            None => match self.get_f64(STAGE_TIMEOUT_KEY)? {
                Some(secs) => (STAGE_TIMEOUT_KEY.to_string(), secs),
                None => return Ok(None),
            },
        };
        timeout_from_secs(&key, secs).map(Some)
    }

    /// Returns a stage-scoped option, `<stage>.<name>`.
    #[must_use]
    pub fn stage_param(&self, stage: StageId, name: &str) -> Option<&Value> {
        self.values.get(&stage_key(stage, name))
    }

    /// Returns the stage selection, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection cannot be parsed.
    pub fn selected_stages(&self) -> Result<Option<StageRequest>, ConfigError> {
        self.values
            .get(STAGES_KEY)
            .map(StageRequest::from_value)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Iterates over every option.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for RunConfig {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn stage_key(stage: StageId, name: &str) -> String {
    format!("{}.{name}", stage.name())
}

/// Validates a timeout expressed in seconds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeout`] for zero, negative or non-finite
/// values.
pub fn timeout_from_secs(key: &str, secs: f64) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidTimeout {
        key: key.to_string(),
        value: secs,
    };
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_max_distance_default() {
        assert_eq!(RunConfig::new().max_distance().unwrap(), DEFAULT_MAX_DISTANCE);
        assert_eq!(
            RunConfig::new().with(MAX_DISTANCE_KEY, 12.5).max_distance().unwrap(),
            12.5
        );
    }

    #[test]
    fn test_max_distance_rejects_bad_values() {
        let config = RunConfig::new().with(MAX_DISTANCE_KEY, -1.0);
        assert_eq!(config.max_distance(), Err(ConfigError::InvalidMaxDistance(-1.0)));

        let config = RunConfig::new().with(MAX_DISTANCE_KEY, "far");
        assert!(matches!(config.max_distance(), Err(ConfigError::InvalidType { .. })));
    }

    #[test]
    fn test_stage_timeout_override() {
        let config = RunConfig::new()
            .with(STAGE_TIMEOUT_KEY, 60)
            .with("segmentation.timeout_secs", 0.5);

        assert_eq!(
            config.stage_timeout(StageId::Segmentation).unwrap(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            config.stage_timeout(StageId::Analysis).unwrap(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(RunConfig::new().stage_timeout(StageId::Analysis).unwrap(), None);
    }

    #[test]
    fn test_stage_timeout_rejects_zero() {
        let config = RunConfig::new().with("cleanup.timeout_secs", 0);
        assert!(matches!(
            config.stage_timeout(StageId::Cleanup),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_stage_param_and_typed_getters() {
        let config = RunConfig::new()
            .with("process_single_cell.channels", json!(["ch00", "ch01"]))
            .with("verbose", true)
            .with("output_dir", "/tmp/out");

        assert_eq!(
            config.stage_param(StageId::ProcessSingleCell, "channels"),
            Some(&json!(["ch00", "ch01"]))
        );
        assert_eq!(config.get_bool("verbose").unwrap(), Some(true));
        assert_eq!(config.get_str("output_dir").unwrap(), Some("/tmp/out"));
        assert!(config.get_f64("output_dir").is_err());
        assert_eq!(config.get_f64("missing").unwrap(), None);
    }

    #[test]
    fn test_selected_stages() {
        let config = RunConfig::new().with(STAGES_KEY, "3,5");
        assert_eq!(
            config.selected_stages().unwrap(),
            Some(StageRequest::stages([3u32, 5]))
        );
        assert_eq!(RunConfig::new().selected_stages().unwrap(), None);

        let config = RunConfig::new().with(STAGES_KEY, "");
        assert!(matches!(
            config.selected_stages(),
            Err(ConfigError::InvalidSelection(_))
        ));
    }

    #[test]
    fn test_deserialize_from_json_object() {
        let config: RunConfig = serde_json::from_value(json!({"max_distance": 8})).unwrap();
        assert_eq!(config.max_distance().unwrap(), 8.0);
    }
}

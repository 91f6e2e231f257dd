//! The result a stage hands back to the executor.

use super::StageArtifact;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Structured failure reported by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Short machine-readable code (e.g., "external_tool", "no_regions").
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra details for diagnostics.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
}

impl StageFailure {
    /// Creates a new failure.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

impl From<anyhow::Error> for StageFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new("error", format!("{err:#}"))
    }
}

/// The outcome of running one stage: `{success, artifacts, error}`.
///
/// Artifacts of an unsuccessful outcome are discarded by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Whether the stage succeeded.
    pub success: bool,

    /// Artifacts produced by the stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<StageArtifact>,

    /// Failure details (for unsuccessful outcomes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageFailure>,
}

impl Default for StageOutcome {
    fn default() -> Self {
        Self::ok()
    }
}

impl StageOutcome {
    /// Creates a successful outcome with no artifacts.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            artifacts: Vec::new(),
            error: None,
        }
    }

    /// Creates a successful outcome carrying artifacts.
    #[must_use]
    pub fn ok_with(artifacts: Vec<StageArtifact>) -> Self {
        Self {
            success: true,
            artifacts,
            error: None,
        }
    }

    /// Creates a failed outcome with a generic code.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::failure(StageFailure::new("stage_failed", message))
    }

    /// Creates a failed outcome from a structured failure.
    #[must_use]
    pub fn failure(error: StageFailure) -> Self {
        Self {
            success: false,
            artifacts: Vec::new(),
            error: Some(error),
        }
    }

    /// Adds an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: StageArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Returns the failure message, or a placeholder when a stage reported
    /// failure without details.
    #[must_use]
    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .map_or_else(|| "stage reported failure without details".to_string(), |e| e.message.clone())
    }
}

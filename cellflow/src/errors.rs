//! Error types for the cellflow workflow engine.
//!
//! Errors are grouped by the phase in which they surface:
//! - [`ValidationError`] before anything runs (bad stage requests)
//! - [`ExecutionError`] while the executor walks a plan
//! - [`DataError`] when a region cannot be used for tracking
//! - [`RegistryError`] and [`ConfigError`] while wiring things up

use crate::core::StageStatus;
use crate::registry::StageId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for cellflow operations.
#[derive(Debug, Error)]
pub enum CellflowError {
    /// A stage request failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A stage failed while executing.
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    /// A region could not be used.
    #[error("{0}")]
    Data(#[from] DataError),

    /// The stage registry was misconfigured.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// A configuration value was invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl CellflowError {
    /// Returns diagnostic info for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        match self {
            Self::Validation(e) => e.error_info(),
            Self::Execution(e) => e.error_info(),
            Self::Data(e) => e.error_info(),
            Self::Registry(e) => e.error_info(),
            Self::Config(e) => e.error_info(),
            Self::Logging(_) => ContractErrorInfo::new("CELLFLOW-LOG", self.to_string()),
        }
    }
}

/// Metadata about an error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CELLFLOW-VAL-MISSING_DEP").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Raised while resolving a stage request into a plan. Nothing has run yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The request names a stage the registry does not know.
    #[error("Unknown stage '{requested}'")]
    UnknownStage {
        /// The id, number or name as requested.
        requested: String,
    },

    /// A requested stage declares a prerequisite that is not in the request.
    #[error("Stage '{stage}' requires '{missing}', which is not part of the requested plan")]
    MissingDependency {
        /// The stage whose prerequisite is missing.
        stage: StageId,
        /// The missing prerequisite.
        missing: StageId,
    },

    /// The request selects no stages at all.
    #[error("Stage request is empty")]
    EmptyRequest,

    /// The textual request could not be parsed.
    #[error("Malformed stage request '{input}': {reason}")]
    MalformedRequest {
        /// The raw input.
        input: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A plan handed to the executor differs from what its own stages
    /// resolve to: it repeats a stage or is out of canonical order.
    #[error("Plan {stages:?} is not in resolved form; expected {expected:?}")]
    UnresolvedPlan {
        /// The stages as given.
        stages: Vec<StageId>,
        /// The stages as resolved.
        expected: Vec<StageId>,
    },
}

impl ValidationError {
    /// Returns diagnostic info for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        match self {
            Self::UnknownStage { requested } => {
                ContractErrorInfo::new("CELLFLOW-VAL-UNKNOWN", format!("No stage matches '{requested}'"))
                    .with_fix_hint("Use a stage number between 1 and 7, a stage name, or 'all'.")
                    .with_context_entry("requested", requested.clone())
            }
            Self::MissingDependency { stage, missing } => ContractErrorInfo::new(
                "CELLFLOW-VAL-MISSING_DEP",
                format!("Prerequisite '{missing}' of '{stage}' was not requested"),
            )
            .with_fix_hint("Add the prerequisite to the request; prerequisites are never inserted automatically.")
            .with_context_entry("stage", stage.name())
            .with_context_entry("missing", missing.name()),
            Self::EmptyRequest => ContractErrorInfo::new("CELLFLOW-VAL-EMPTY", "No stages requested")
                .with_fix_hint("Request at least one stage, or 'all'."),
            Self::MalformedRequest { input, .. } => {
                ContractErrorInfo::new("CELLFLOW-VAL-MALFORMED", "Stage request could not be parsed")
                    .with_fix_hint("Use a comma separated list of numbers, ranges like '2-4', or names.")
                    .with_context_entry("input", input.clone())
            }
            Self::UnresolvedPlan { .. } => {
                ContractErrorInfo::new("CELLFLOW-VAL-UNRESOLVED", "Plan was not produced by resolve_plan")
                    .with_fix_hint("Build plans with resolve_plan against the executor's registry.")
            }
        }
    }
}

/// Raised while the executor runs a plan.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The stage reported failure through its outcome.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed {
        /// The failing stage.
        stage: StageId,
        /// The failure message reported by the stage.
        message: String,
    },

    /// The stage exceeded its time budget.
    #[error("Stage '{stage}' timed out after {timeout_secs}s")]
    Timeout {
        /// The stage that timed out.
        stage: StageId,
        /// The configured timeout.
        timeout_secs: f64,
    },

    /// The stage panicked while running.
    #[error("Stage '{stage}' panicked: {message}")]
    Panicked {
        /// The stage that panicked.
        stage: StageId,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The plan names a stage for which no implementation is bound.
    #[error("No implementation bound for stage '{stage}'")]
    MissingImplementation {
        /// The unbound stage.
        stage: StageId,
    },

    /// The stage produced an artifact whose name is already taken.
    #[error("Stage '{stage}' produced artifact '{artifact}', which already exists")]
    ArtifactConflict {
        /// The producing stage.
        stage: StageId,
        /// The conflicting artifact name.
        artifact: String,
    },

    /// A status change would move a stage backwards.
    #[error("Stage '{stage}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// The stage.
        stage: StageId,
        /// The current status.
        from: StageStatus,
        /// The rejected target status.
        to: StageStatus,
    },
}

impl ExecutionError {
    /// Returns the stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> StageId {
        match self {
            Self::StageFailed { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Panicked { stage, .. }
            | Self::MissingImplementation { stage }
            | Self::ArtifactConflict { stage, .. }
            | Self::InvalidTransition { stage, .. } => *stage,
        }
    }

    /// Returns diagnostic info for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        let info = match self {
            Self::StageFailed { message, .. } => ContractErrorInfo::new("CELLFLOW-EXEC-FAILED", message.clone())
                .with_fix_hint("Inspect the stage logs; rerun the remaining stages with resume_request()."),
            Self::Timeout { timeout_secs, .. } => {
                ContractErrorInfo::new("CELLFLOW-EXEC-TIMEOUT", format!("Stage exceeded {timeout_secs}s"))
                    .with_fix_hint("Raise '<stage>.timeout_secs' or 'stage_timeout_secs'.")
            }
            Self::Panicked { message, .. } => ContractErrorInfo::new("CELLFLOW-EXEC-PANIC", message.clone()),
            Self::MissingImplementation { .. } => {
                ContractErrorInfo::new("CELLFLOW-EXEC-UNBOUND", "No implementation bound for a planned stage")
                    .with_fix_hint("Add the stage to the StageSet given to the executor.")
            }
            Self::ArtifactConflict { artifact, .. } => {
                ContractErrorInfo::new("CELLFLOW-EXEC-ARTIFACT", format!("Artifact '{artifact}' already exists"))
                    .with_fix_hint("Artifact names must be unique within a run.")
            }
            Self::InvalidTransition { from, to, .. } => {
                ContractErrorInfo::new("CELLFLOW-EXEC-TRANSITION", format!("{from} -> {to} is not allowed"))
            }
        };
        info.with_context_entry("stage", self.stage().name())
    }
}

/// A region that cannot take part in tracking.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataError {
    /// The polygon has fewer than three vertices.
    #[error("Region '{region_id}' has {count} vertices; at least 3 are required")]
    TooFewVertices {
        /// The region id.
        region_id: String,
        /// The number of vertices found.
        count: usize,
    },

    /// The centroid came out as NaN or infinite.
    #[error("Region '{region_id}' has a non-finite centroid")]
    NonFiniteCentroid {
        /// The region id.
        region_id: String,
    },

    /// Two regions in one group share an id.
    #[error("Region id '{region_id}' appears more than once in the group")]
    DuplicateRegion {
        /// The repeated id.
        region_id: String,
    },

    /// Frames were not ordered by strictly increasing timepoint.
    #[error("Timepoint {next} follows {previous}; timepoints must strictly increase")]
    NonMonotonicTimepoints {
        /// The earlier frame's timepoint.
        previous: u32,
        /// The offending frame's timepoint.
        next: u32,
    },
}

impl DataError {
    /// Returns diagnostic info for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        match self {
            Self::TooFewVertices { region_id, count } => {
                ContractErrorInfo::new("CELLFLOW-DATA-VERTICES", format!("Polygon has {count} vertices"))
                    .with_context_entry("region_id", region_id.clone())
            }
            Self::NonFiniteCentroid { region_id } => {
                ContractErrorInfo::new("CELLFLOW-DATA-CENTROID", "Centroid is not finite")
                    .with_fix_hint("Check the region's vertex coordinates for NaN or overflow.")
                    .with_context_entry("region_id", region_id.clone())
            }
            Self::DuplicateRegion { region_id } => {
                ContractErrorInfo::new("CELLFLOW-DATA-DUPLICATE", "Region id is not unique within its group")
                    .with_context_entry("region_id", region_id.clone())
            }
            Self::NonMonotonicTimepoints { previous, next } => {
                ContractErrorInfo::new("CELLFLOW-DATA-ORDER", format!("Timepoint {next} follows {previous}"))
                    .with_fix_hint("Order frames by strictly increasing timepoint.")
            }
        }
    }
}

/// Raised while building a stage registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The id was already registered.
    #[error("Stage '{0}' is already registered")]
    DuplicateId(StageId),

    /// Another stage already holds this canonical position.
    #[error("Position {position} is already taken by '{existing}'")]
    DuplicatePosition {
        /// The contested position.
        position: u32,
        /// The stage already holding it.
        existing: StageId,
    },

    /// The registry was already closed.
    #[error("Stage registry is closed; '{0}' cannot be registered")]
    Closed(StageId),

    /// A prerequisite is not registered.
    #[error("Stage '{stage}' declares unregistered prerequisite '{prerequisite}'")]
    UnknownPrerequisite {
        /// The declaring stage.
        stage: StageId,
        /// The unregistered prerequisite.
        prerequisite: StageId,
    },

    /// A prerequisite sits at or after the stage that needs it.
    #[error("Prerequisite '{prerequisite}' must come before '{stage}' in canonical order")]
    PrerequisiteOrder {
        /// The declaring stage.
        stage: StageId,
        /// The misplaced prerequisite.
        prerequisite: StageId,
    },
}

impl RegistryError {
    /// Returns diagnostic info for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        let code = match self {
            Self::DuplicateId(_) => "CELLFLOW-REG-DUPLICATE_ID",
            Self::DuplicatePosition { .. } => "CELLFLOW-REG-DUPLICATE_POSITION",
            Self::Closed(_) => "CELLFLOW-REG-CLOSED",
            Self::UnknownPrerequisite { .. } => "CELLFLOW-REG-UNKNOWN_PREREQ",
            Self::PrerequisiteOrder { .. } => "CELLFLOW-REG-PREREQ_ORDER",
        };
        ContractErrorInfo::new(code, self.to_string())
    }
}

/// A configuration value had the wrong type or range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The value has the wrong JSON type.
    #[error("Option '{key}' must be {expected}, found {found}")]
    InvalidType {
        /// The option name.
        key: String,
        /// What was expected.
        expected: &'static str,
        /// The value found.
        found: String,
    },

    /// The tracking distance threshold is unusable.
    #[error("max_distance must be finite and non-negative, got {0}")]
    InvalidMaxDistance(f64),

    /// A timeout is zero, negative or not finite.
    #[error("Option '{key}' must be a positive number of seconds, got {value}")]
    InvalidTimeout {
        /// The option name.
        key: String,
        /// The rejected value.
        value: f64,
    },

    /// The stage selection option could not be turned into a request.
    #[error("Option 'stages' is invalid: {0}")]
    InvalidSelection(#[from] ValidationError),
}

impl ConfigError {
    /// Returns diagnostic info for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        match self {
            Self::InvalidType { key, .. } => ContractErrorInfo::new("CELLFLOW-CFG-TYPE", self.to_string())
                .with_context_entry("key", key.clone()),
            Self::InvalidMaxDistance(_) => ContractErrorInfo::new("CELLFLOW-CFG-DISTANCE", self.to_string())
                .with_fix_hint("Use a finite, non-negative pixel distance."),
            Self::InvalidTimeout { key, .. } => ContractErrorInfo::new("CELLFLOW-CFG-TIMEOUT", self.to_string())
                .with_context_entry("key", key.clone()),
            Self::InvalidSelection(inner) => {
                let mut info = inner.error_info();
                info.code = "CELLFLOW-CFG-STAGES".to_string();
                info
            }
        }
    }
}

/// Raised by a tracking pass over one group.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// A region in the group was malformed.
    #[error("{0}")]
    Data(#[from] DataError),

    /// The tracking parameters were invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl From<TrackingError> for CellflowError {
    fn from(err: TrackingError) -> Self {
        match err {
            TrackingError::Data(e) => Self::Data(e),
            TrackingError::Config(e) => Self::Config(e),
        }
    }
}

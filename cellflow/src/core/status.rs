//! Stage and workflow status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a single stage within one run.
///
/// Statuses only move forward:
/// `NotRun -> Running -> {Completed, Failed, SkippedBestEffort}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been started in this run.
    #[default]
    NotRun,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Completed,
    /// Stage failed and halted the run.
    Failed,
    /// A best-effort stage failed; the run carried on.
    SkippedBestEffort,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRun => write!(f, "not_run"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::SkippedBestEffort => write!(f, "skipped_best_effort"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::SkippedBestEffort)
    }

    /// Returns true if the stage finished without halting the run.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the stage failed, whether or not the run continued.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::SkippedBestEffort)
    }

    /// Returns true if moving to `next` is a legal forward transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotRun, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed | Self::SkippedBestEffort)
        )
    }
}

/// The overall status of a workflow run, derived from its stage statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// No stage has started.
    #[default]
    Pending,
    /// At least one stage has started and the run has not finished.
    Running,
    /// Every required stage completed.
    Completed,
    /// A required stage failed.
    Failed,
    /// The run was halted by a cancellation request.
    Cancelled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl WorkflowStatus {
    /// Returns true if the run is over.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

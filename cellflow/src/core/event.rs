//! Progress events emitted while a workflow runs.

use crate::registry::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What happened to the unit of work the event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// A stage started.
    Started,
    /// A stage completed.
    Completed,
    /// A stage failed and halted the run.
    Failed,
    /// A best-effort stage failed; the run continues.
    Skipped,
    /// The run was cancelled before this stage.
    Cancelled,
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A `(stage_index, stage_total, label)` progress notification.
///
/// `index` is 1-based so that the last stage reports `index == total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run that emitted the event.
    pub run_id: Uuid,
    /// Position of the stage within the plan, starting at 1.
    pub index: usize,
    /// Number of stages in the plan.
    pub total: usize,
    /// Display label (the stage name).
    pub label: String,
    /// The stage the event is about.
    pub stage: StageId,
    /// What happened.
    pub kind: ProgressKind,
    /// When the event occurred (ISO 8601).
    pub timestamp: String,
}

impl ProgressEvent {
    /// Creates a new progress event.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        stage: StageId,
        label: impl Into<String>,
        index: usize,
        total: usize,
        kind: ProgressKind,
    ) -> Self {
        Self {
            run_id,
            index,
            total,
            label: label.into(),
            stage,
            kind,
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Returns the event as a `stage.<kind>` event type string.
    #[must_use]
    pub fn event_type(&self) -> String {
        format!("stage.{}", self.kind)
    }
}

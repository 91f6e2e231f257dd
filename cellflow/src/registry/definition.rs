//! Stage definitions: one row of the registry table.

use super::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Immutable description of a stage: where it sits and what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// The stage id.
    pub id: StageId,
    /// Display name.
    pub name: String,
    /// Canonical position. Unique within a registry; also the stage number
    /// users type when selecting stages.
    pub position: u32,
    /// Stages that must be part of the same plan.
    pub prerequisites: BTreeSet<StageId>,
    /// Whether a failure of this stage lets the run continue.
    pub best_effort: bool,
}

impl StageDefinition {
    /// Creates a definition named after its id, with no prerequisites.
    #[must_use]
    pub fn new(id: StageId, position: u32) -> Self {
        Self {
            id,
            name: id.name().to_string(),
            position,
            prerequisites: BTreeSet::new(),
            best_effort: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a prerequisite.
    #[must_use]
    pub fn requires(mut self, prerequisite: StageId) -> Self {
        self.prerequisites.insert(prerequisite);
        self
    }

    /// Marks the stage as best-effort.
    #[must_use]
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }
}

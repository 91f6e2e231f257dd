//! Resolution of stage requests into canonical execution plans.

use super::{StageRequest, StageSelector};
use crate::errors::ValidationError;
use crate::registry::{StageDefinition, StageId, StageRegistry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// An ordered, deduplicated list of stages that satisfies every declared
/// prerequisite. Plans are produced by [`resolve_plan`].
///
/// Deserialization only rejects empty and repeated stage lists; order and
/// prerequisites depend on a registry, so the executor re-resolves every
/// plan before running it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredPlan")]
pub struct WorkflowPlan {
    stages: Vec<StageId>,
}

/// A plan as read back from storage.
#[derive(Deserialize)]
struct StoredPlan {
    stages: Vec<StageId>,
}

impl TryFrom<StoredPlan> for WorkflowPlan {
    type Error = ValidationError;

    fn try_from(stored: StoredPlan) -> Result<Self, Self::Error> {
        if stored.stages.is_empty() {
            return Err(ValidationError::EmptyRequest);
        }
        let mut seen = HashSet::new();
        if let Some(repeated) = stored.stages.iter().find(|id| !seen.insert(**id)) {
            return Err(ValidationError::MalformedRequest {
                input: format!("{:?}", stored.stages),
                reason: format!("stage '{repeated}' appears more than once"),
            });
        }
        Ok(Self { stages: stored.stages })
    }
}

impl WorkflowPlan {
    /// Returns the stage ids in execution order.
    #[must_use]
    pub fn ids(&self) -> &[StageId] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the plan has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if the plan includes the stage.
    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains(&id)
    }

    /// Returns the zero-based position of a stage within the plan.
    #[must_use]
    pub fn index_of(&self, id: StageId) -> Option<usize> {
        self.stages.iter().position(|s| *s == id)
    }

    /// Converts the plan back into an explicit request.
    #[must_use]
    pub fn to_request(&self) -> StageRequest {
        StageRequest::stages(self.stages.iter().copied())
    }

    /// Returns a stable hex digest of the plan, for logs and audit trails.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for id in &self.stages {
            hasher.update(id.name().as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// Resolves a request into a plan ordered by canonical registry position.
///
/// Unknown stages are rejected, duplicates collapse onto their first
/// occurrence, and every prerequisite of an included stage must itself be
/// requested; nothing is inserted automatically. The function is pure, and
/// resolving a plan's own request yields the same plan.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownStage`], [`ValidationError::EmptyRequest`]
/// or [`ValidationError::MissingDependency`].
pub fn resolve_plan(registry: &StageRegistry, request: &StageRequest) -> Result<WorkflowPlan, ValidationError> {
    let mut stages = match request {
        StageRequest::All => registry.ids(),
        StageRequest::Stages(selectors) => selectors
            .iter()
            .map(|selector| resolve_selector(registry, selector).map(|d| d.id))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if stages.is_empty() {
        return Err(ValidationError::EmptyRequest);
    }

    let mut seen = HashSet::new();
    stages.retain(|id| seen.insert(*id));
    stages.sort_by_key(|id| registry.position(*id));

    for id in &stages {
        let Some(definition) = registry.get(*id) else {
            continue;
        };
        if let Some(missing) = definition.prerequisites.iter().find(|p| !seen.contains(*p)) {
            return Err(ValidationError::MissingDependency {
                stage: *id,
                missing: *missing,
            });
        }
    }

    Ok(WorkflowPlan { stages })
}

fn resolve_selector<'r>(
    registry: &'r StageRegistry,
    selector: &StageSelector,
) -> Result<&'r StageDefinition, ValidationError> {
    let found = match selector {
        StageSelector::Id(id) => registry.get(*id),
        StageSelector::Number(number) => registry.by_position(*number),
        StageSelector::Name(name) => registry.by_name(name.trim()),
    };
    found.ok_or_else(|| ValidationError::UnknownStage {
        requested: selector.to_string(),
    })
}

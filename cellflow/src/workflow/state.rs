//! Per-run workflow state and the result handed back to callers.

use super::{StageRequest, WorkflowPlan};
use crate::core::{ArtifactSet, StageStatus, WorkflowStatus};
use crate::errors::ExecutionError;
use crate::registry::{StageId, StageRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// What happened to one stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageId,
    /// Display name from the registry.
    pub name: String,
    /// Whether the stage was tagged best-effort.
    pub best_effort: bool,
    /// Current status.
    pub status: StageStatus,
    /// The error, for failed and skipped stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    /// When the stage started (ISO 8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// How long the stage ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// Mutable state of one run. Only the executor advances it; everything
/// else reads it through the query methods.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    plan: WorkflowPlan,
    records: Vec<StageRecord>,
    cancel_reason: Option<String>,
}

impl WorkflowState {
    /// Creates a state with every planned stage `NotRun`.
    #[must_use]
    pub fn new(plan: WorkflowPlan, registry: &StageRegistry) -> Self {
        let records = plan
            .ids()
            .iter()
            .map(|&stage| {
                let definition = registry.get(stage);
                StageRecord {
                    stage,
                    name: definition.map_or_else(|| stage.name().to_string(), |d| d.name.clone()),
                    best_effort: definition.is_some_and(|d| d.best_effort),
                    status: StageStatus::NotRun,
                    error: None,
                    started_at: None,
                    duration_ms: None,
                }
            })
            .collect();

        Self {
            plan,
            records,
            cancel_reason: None,
        }
    }

    /// Returns the plan being executed.
    #[must_use]
    pub fn plan(&self) -> &WorkflowPlan {
        &self.plan
    }

    /// Returns the records in plan order.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Returns the record of a stage.
    #[must_use]
    pub fn record(&self, stage: StageId) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.stage == stage)
    }

    /// Returns the status of a stage, or `None` if it is not in the plan.
    #[must_use]
    pub fn status_of(&self, stage: StageId) -> Option<StageStatus> {
        self.record(stage).map(|r| r.status)
    }

    /// Derives the overall status from the stage statuses.
    #[must_use]
    pub fn overall_status(&self) -> WorkflowStatus {
        derive_status(&self.records, self.cancel_reason.is_some())
    }

    /// Returns the stages with the given status, in plan order.
    #[must_use]
    pub fn with_status(&self, status: StageStatus) -> Vec<StageId> {
        stages_with(&self.records, status)
    }

    /// Returns the completed stages, in plan order.
    #[must_use]
    pub fn completed(&self) -> Vec<StageId> {
        self.with_status(StageStatus::Completed)
    }

    /// Returns the failed stages, in plan order.
    #[must_use]
    pub fn failed(&self) -> Vec<StageId> {
        self.with_status(StageStatus::Failed)
    }

    /// Returns the stages that never ran, in plan order.
    #[must_use]
    pub fn not_run(&self) -> Vec<StageId> {
        self.with_status(StageStatus::NotRun)
    }

    /// Returns the first stage that has not run yet.
    #[must_use]
    pub fn next_unexecuted(&self) -> Option<StageId> {
        self.records
            .iter()
            .find(|r| r.status == StageStatus::NotRun)
            .map(|r| r.stage)
    }

    /// Returns the cancellation reason, if the run was cancelled.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub(crate) fn mark_running(&mut self, stage: StageId) -> Result<(), ExecutionError> {
        let record = self.transition(stage, StageStatus::Running)?;
        record.started_at = Some(crate::utils::iso_timestamp());
        Ok(())
    }

    pub(crate) fn mark_finished(
        &mut self,
        stage: StageId,
        status: StageStatus,
        error: Option<ExecutionError>,
        duration_ms: f64,
    ) -> Result<(), ExecutionError> {
        let record = self.transition(stage, status)?;
        record.error = error;
        record.duration_ms = Some(duration_ms);
        Ok(())
    }

    pub(crate) fn mark_cancelled(&mut self, reason: impl Into<String>) {
        if self.cancel_reason.is_none() {
            self.cancel_reason = Some(reason.into());
        }
    }

    fn transition(&mut self, stage: StageId, to: StageStatus) -> Result<&mut StageRecord, ExecutionError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.stage == stage)
            .ok_or(ExecutionError::MissingImplementation { stage })?;

        if !record.status.can_transition_to(to) {
            return Err(ExecutionError::InvalidTransition {
                stage,
                from: record.status,
                to,
            });
        }
        record.status = to;
        Ok(record)
    }

    /// Finishes the run and produces the caller-facing result.
    #[must_use]
    pub fn into_result(self, run_id: Uuid, artifacts: ArtifactSet, started_at: String) -> WorkflowResult {
        WorkflowResult {
            run_id,
            status: self.overall_status(),
            plan_fingerprint: self.plan.fingerprint(),
            plan: self.plan,
            stages: self.records,
            artifacts,
            cancel_reason: self.cancel_reason,
            started_at,
            finished_at: crate::utils::iso_timestamp(),
        }
    }
}

/// A raised cancellation wins over a failure: the stage it interrupted
/// reports as failed, but the run ended because it was cancelled.
fn derive_status(records: &[StageRecord], cancelled: bool) -> WorkflowStatus {
    if cancelled {
        WorkflowStatus::Cancelled
    } else if records.iter().any(|r| r.status == StageStatus::Failed) {
        WorkflowStatus::Failed
    } else if records.iter().all(|r| r.status.is_terminal()) {
        WorkflowStatus::Completed
    } else if records.iter().all(|r| r.status == StageStatus::NotRun) {
        WorkflowStatus::Pending
    } else {
        WorkflowStatus::Running
    }
}

fn stages_with(records: &[StageRecord], status: StageStatus) -> Vec<StageId> {
    records.iter().filter(|r| r.status == status).map(|r| r.stage).collect()
}

/// Per-stage account of a finished run, plus the artifacts it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// The run id.
    pub run_id: Uuid,
    /// Overall status.
    pub status: WorkflowStatus,
    /// The executed plan.
    pub plan: WorkflowPlan,
    /// Digest of the plan.
    pub plan_fingerprint: String,
    /// One record per planned stage, in plan order.
    pub stages: Vec<StageRecord>,
    /// Artifacts of every completed stage.
    pub artifacts: ArtifactSet,
    /// Why the run was cancelled, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    /// When the run started (ISO 8601).
    pub started_at: String,
    /// When the run finished (ISO 8601).
    pub finished_at: String,
}

impl WorkflowResult {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    /// Returns the status of a stage, or `None` if it was not planned.
    #[must_use]
    pub fn status_of(&self, stage: StageId) -> Option<StageStatus> {
        self.stages.iter().find(|r| r.stage == stage).map(|r| r.status)
    }

    /// Returns the stages with the given status, in plan order.
    #[must_use]
    pub fn with_status(&self, status: StageStatus) -> Vec<StageId> {
        stages_with(&self.stages, status)
    }

    /// Returns the error of the stage that halted the run, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&ExecutionError> {
        self.stages
            .iter()
            .find(|r| r.status == StageStatus::Failed)
            .and_then(|r| r.error.as_ref())
    }

    /// Builds the request for a manual resume, or `None` if nothing is left.
    ///
    /// The request holds every failed or never-run stage. Completed stages
    /// that those stages require are included again: artifacts only live
    /// for the duration of a run, so a resumed run has to reproduce them.
    #[must_use]
    pub fn resume_request(&self, registry: &StageRegistry) -> Option<StageRequest> {
        let mut wanted: BTreeSet<StageId> = self
            .stages
            .iter()
            .filter(|r| matches!(r.status, StageStatus::Failed | StageStatus::NotRun))
            .map(|r| r.stage)
            .collect();
        if wanted.is_empty() {
            return None;
        }

        let mut pending: Vec<StageId> = wanted.iter().copied().collect();
        while let Some(stage) = pending.pop() {
            if let Some(definition) = registry.get(stage) {
                for prerequisite in &definition.prerequisites {
                    if wanted.insert(*prerequisite) {
                        pending.push(*prerequisite);
                    }
                }
            }
        }

        let mut ordered: Vec<StageId> = wanted.into_iter().collect();
        ordered.sort_by_key(|id| registry.position(*id));
        Some(StageRequest::stages(ordered))
    }
}

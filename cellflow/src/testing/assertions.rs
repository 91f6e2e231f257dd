//! Assertions over workflow results.

use crate::core::{StageStatus, WorkflowStatus};
use crate::registry::StageId;
use crate::workflow::WorkflowResult;

/// Asserts the status of one stage.
pub fn assert_stage_status(result: &WorkflowResult, stage: StageId, expected: StageStatus) {
    let actual = result.status_of(stage);
    assert_eq!(
        actual,
        Some(expected),
        "Expected {stage} to be {expected}, got {actual:?}"
    );
}

/// Asserts the overall status.
pub fn assert_workflow_status(result: &WorkflowResult, expected: WorkflowStatus) {
    assert_eq!(
        result.status, expected,
        "Expected run to be {expected:?}, got {:?}; stages: {:?}",
        result.status, result.stages
    );
}

/// Asserts that every planned stage completed.
pub fn assert_all_completed(result: &WorkflowResult) {
    assert_workflow_status(result, WorkflowStatus::Completed);
    for record in &result.stages {
        assert_eq!(
            record.status,
            StageStatus::Completed,
            "Expected {} to be completed, got {}",
            record.stage,
            record.status
        );
    }
}

/// Asserts that the listed stages never ran.
pub fn assert_not_run(result: &WorkflowResult, stages: &[StageId]) {
    for &stage in stages {
        assert_stage_status(result, stage, StageStatus::NotRun);
    }
}

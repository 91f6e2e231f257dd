//! Workflow orchestration: turning requests into plans and tracking the
//! state of a run.

mod plan;
mod request;
mod state;

pub use plan::{resolve_plan, WorkflowPlan};
pub use request::{StageRequest, StageSelector};
pub use state::{StageRecord, WorkflowResult, WorkflowState};

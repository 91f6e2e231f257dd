//! Testing utilities: fake stages, region fixtures and result assertions.

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_all_completed, assert_not_run, assert_stage_status, assert_workflow_status};
pub use fixtures::{
    degenerate_region, degenerate_region_in, fixture_group, noop_stages, region_at, region_in, square,
    FIXTURE_CHANNEL, FIXTURE_CONDITION, FIXTURE_REGION,
};
pub use mocks::{FailingStage, MockStage, PanickingStage, SlowStage};

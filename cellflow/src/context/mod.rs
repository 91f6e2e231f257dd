//! Run configuration and the per-stage context.

mod config;
mod run;

pub use config::{
    timeout_from_secs, RunConfig, DEFAULT_MAX_DISTANCE, MAX_DISTANCE_KEY, STAGES_KEY, STAGE_TIMEOUT_KEY,
};
pub use run::RunContext;

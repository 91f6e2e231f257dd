//! Plan execution.
//!
//! The [`Executor`] walks a resolved [`WorkflowPlan`](crate::workflow::WorkflowPlan)
//! in order, binding each id to a [`Stage`](crate::stages::Stage)
//! implementation and recording the outcome in a
//! [`WorkflowResult`](crate::workflow::WorkflowResult).

mod config;
mod executor;
mod integration_tests;

pub use config::ExecutorConfig;
pub use executor::Executor;

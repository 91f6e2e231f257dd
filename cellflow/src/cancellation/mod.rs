//! Cooperative cancellation of workflow runs.
//!
//! The executor checks the token between stages. Stages that run for a
//! long time may also poll [`CancellationToken::is_cancelled`] or await
//! [`CancellationToken::cancelled`] to stop early.

mod token;

pub use token::{CancelCallback, CancellationToken};

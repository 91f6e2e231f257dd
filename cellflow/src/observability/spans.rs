//! Spans for runs and stages.

use crate::registry::StageId;
use std::time::{Duration, Instant};
use tracing::{info_span, Span};
use uuid::Uuid;

/// Span covering a whole workflow run.
#[must_use]
pub fn run_span(run_id: Uuid, total: usize, fingerprint: &str) -> Span {
    info_span!("workflow_run", %run_id, total, plan = %fingerprint)
}

/// Span covering one stage. `index` is 1-based.
#[must_use]
pub fn stage_span(stage: StageId, index: usize, total: usize) -> Span {
    info_span!("stage", stage = %stage, index, total)
}

/// Measures how long something took.
#[derive(Debug, Clone, Copy)]
pub struct SpanTimer {
    start: Instant,
}

impl SpanTimer {
    /// Starts timing.
    #[must_use]
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Milliseconds since the timer started.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        crate::utils::duration_ms(self.elapsed())
    }
}

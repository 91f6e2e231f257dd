//! Fake stages for exercising the executor.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crate::context::RunContext;
use crate::core::{StageArtifact, StageOutcome};
use crate::registry::StageId;
use crate::stages::Stage;

/// A stage that records its calls and returns a configurable outcome.
#[derive(Debug)]
pub struct MockStage {
    id: StageId,
    outcome: Mutex<StageOutcome>,
    calls: Mutex<usize>,
    seen_artifacts: Mutex<Vec<Vec<String>>>,
}

impl MockStage {
    /// Creates a mock that succeeds with no artifacts.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            outcome: Mutex::new(StageOutcome::ok()),
            calls: Mutex::new(0),
            seen_artifacts: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that succeeds with one JSON artifact.
    #[must_use]
    pub fn producing(id: StageId, artifact: impl Into<String>) -> Self {
        let mock = Self::new(id);
        mock.set_outcome(
            StageOutcome::ok().with_artifact(StageArtifact::new(artifact, "json", serde_json::json!({"by": id}))),
        );
        mock
    }

    /// Sets the outcome returned by later calls.
    pub fn set_outcome(&self, outcome: StageOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    /// Returns, per call, the artifact names the stage could see.
    #[must_use]
    pub fn seen_artifacts(&self) -> Vec<Vec<String>> {
        self.seen_artifacts.lock().clone()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        *self.calls.lock() += 1;
        self.seen_artifacts
            .lock()
            .push(ctx.artifacts().names().into_iter().map(str::to_string).collect());
        self.outcome.lock().clone()
    }
}

/// A stage that always fails, optionally after producing artifacts that
/// must never become visible.
#[derive(Debug)]
pub struct FailingStage {
    id: StageId,
    message: String,
    leaked: Vec<StageArtifact>,
}

impl FailingStage {
    /// Creates a failing stage.
    #[must_use]
    pub fn new(id: StageId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            leaked: Vec::new(),
        }
    }

    /// Attaches an artifact to the failed outcome.
    #[must_use]
    pub fn with_partial_artifact(mut self, name: impl Into<String>) -> Self {
        self.leaked.push(StageArtifact::new(name, "json", serde_json::Value::Null));
        self
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: &RunContext) -> StageOutcome {
        let mut outcome = StageOutcome::fail(&self.message);
        outcome.artifacts.clone_from(&self.leaked);
        outcome
    }
}

/// A stage that sleeps before succeeding.
#[derive(Debug)]
pub struct SlowStage {
    id: StageId,
    delay: Duration,
}

impl SlowStage {
    /// Creates a slow stage.
    #[must_use]
    pub fn new(id: StageId, delay: Duration) -> Self {
        Self { id, delay }
    }

    /// Creates a slow stage with a delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(id: StageId, ms: u64) -> Self {
        Self::new(id, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: &RunContext) -> StageOutcome {
        tokio::time::sleep(self.delay).await;
        StageOutcome::ok()
    }
}

/// A stage that panics.
#[derive(Debug)]
pub struct PanickingStage {
    id: StageId,
    message: String,
}

impl PanickingStage {
    /// Creates a panicking stage.
    #[must_use]
    pub fn new(id: StageId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn id(&self) -> StageId {
        self.id
    }

    #[allow(clippy::panic)]
    async fn run(&self, _ctx: &RunContext) -> StageOutcome {
        panic!("{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunConfig;

    #[tokio::test]
    async fn test_mock_stage_records_calls() {
        let stage = MockStage::producing(StageId::DataSelection, "selection");
        let ctx = RunContext::new(RunConfig::new());

        let outcome = stage.run(&ctx).await;
        assert!(outcome.success);
        assert_eq!(outcome.artifacts[0].name, "selection");
        assert_eq!(stage.call_count(), 1);
        assert_eq!(stage.seen_artifacts(), vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn test_failing_stage_keeps_partial_artifacts_in_outcome() {
        let stage = FailingStage::new(StageId::Segmentation, "boom").with_partial_artifact("masks");
        let outcome = stage.run(&RunContext::new(RunConfig::new())).await;

        assert!(!outcome.success);
        assert_eq!(outcome.failure_message(), "boom");
        assert_eq!(outcome.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_stage_waits() {
        let stage = SlowStage::with_delay_ms(StageId::Analysis, 20);
        let start = std::time::Instant::now();
        assert!(stage.run(&RunContext::new(RunConfig::new())).await.success);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}

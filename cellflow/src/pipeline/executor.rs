//! Sequential execution of a resolved plan.

use super::ExecutorConfig;
use crate::context::{RunConfig, RunContext};
use crate::core::{ArtifactSet, ProgressEvent, ProgressKind, StageOutcome, StageStatus};
use crate::errors::{CellflowError, ConfigError, ExecutionError, ValidationError};
use crate::events::{NoOpProgressSink, ProgressSink};
use crate::observability::{run_span, stage_span, SpanTimer};
use crate::registry::{StageId, StageRegistry};
use crate::stages::StageSet;
use crate::workflow::{resolve_plan, StageRequest, WorkflowPlan, WorkflowResult, WorkflowState};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Runs the stages of a plan one at a time, in plan order.
///
/// A stage that fails, times out or panics halts the run unless its
/// definition is best-effort, in which case it is recorded as
/// `SkippedBestEffort` and the run carries on. Cancellation is checked
/// before each stage. Artifacts of a stage become visible to later stages
/// only once it completed.
pub struct Executor {
    registry: Arc<StageRegistry>,
    stages: StageSet,
    sink: Arc<dyn ProgressSink>,
    config: ExecutorConfig,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("registry", &self.registry.ids())
            .field("stages", &self.stages)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Creates an executor over the canonical registry.
    #[must_use]
    pub fn new(stages: StageSet) -> Self {
        Self {
            registry: Arc::new(StageRegistry::canonical().clone()),
            stages,
            sink: Arc::new(NoOpProgressSink),
            config: ExecutorConfig::default(),
        }
    }

    /// Uses another registry.
    #[must_use]
    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Sends progress events to `sink`.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets executor-wide options.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the registry plans are resolved against.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Reports the first planned stage with no bound implementation.
    ///
    /// [`execute`](Self::execute) reports the same problem as a stage
    /// failure when it reaches that stage; this lets callers refuse the
    /// plan up front instead.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::MissingImplementation`].
    pub fn check_plan(&self, plan: &WorkflowPlan) -> Result<(), ExecutionError> {
        match plan.ids().iter().find(|id| !self.stages.contains(**id)) {
            Some(&stage) => Err(ExecutionError::MissingImplementation { stage }),
            None => Ok(()),
        }
    }

    /// Resolves `request` and executes the resulting plan.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the request does not resolve; no
    /// stage runs in that case.
    pub async fn run(&self, request: &StageRequest, context: RunContext) -> Result<WorkflowResult, ValidationError> {
        let plan = resolve_plan(&self.registry, request)?;
        self.execute(&plan, context).await
    }

    /// Runs the stages selected by the context's `stages` option, or every
    /// stage when the option is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the option is malformed or does not resolve.
    pub async fn run_configured(&self, context: RunContext) -> Result<WorkflowResult, CellflowError> {
        let request = context.config().selected_stages()?.unwrap_or(StageRequest::All);
        Ok(self.run(&request, context).await?)
    }

    /// Checks that `plan` is exactly what its stages resolve to against
    /// this executor's registry.
    ///
    /// # Errors
    ///
    /// Returns the resolution error, or [`ValidationError::UnresolvedPlan`]
    /// if the plan repeats a stage or is out of canonical order.
    pub fn validate_plan(&self, plan: &WorkflowPlan) -> Result<(), ValidationError> {
        let resolved = resolve_plan(&self.registry, &plan.to_request())?;
        if resolved != *plan {
            return Err(ValidationError::UnresolvedPlan {
                stages: plan.ids().to_vec(),
                expected: resolved.ids().to_vec(),
            });
        }
        Ok(())
    }

    /// Executes a plan and reports what happened to every stage.
    ///
    /// Stage failures never surface as `Err`; they are recorded in the
    /// returned [`WorkflowResult`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the plan does not pass
    /// [`validate_plan`](Self::validate_plan); no stage runs in that case.
    pub async fn execute(&self, plan: &WorkflowPlan, context: RunContext) -> Result<WorkflowResult, ValidationError> {
        self.validate_plan(plan)?;
        let span = run_span(context.run_id(), plan.len(), &plan.fingerprint());
        Ok(self.execute_plan(plan, context).instrument(span).await)
    }

    async fn execute_plan(&self, plan: &WorkflowPlan, context: RunContext) -> WorkflowResult {
        let run_id = context.run_id();
        let started_at = crate::utils::iso_timestamp();
        let run_timer = SpanTimer::start();
        let total = plan.len();
        let mut state = WorkflowState::new(plan.clone(), &self.registry);
        let mut artifacts = context.artifacts().clone();

        info!(total, "Workflow run started");

        for (offset, &stage) in plan.ids().iter().enumerate() {
            let index = offset + 1;
            let (label, best_effort) = state
                .record(stage)
                .map_or_else(|| (stage.name().to_string(), false), |r| (r.name.clone(), r.best_effort));

            if context.is_cancelled() {
                let reason = context
                    .cancellation()
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                warn!(%stage, index, total, reason = %reason, "Run cancelled before stage");
                state.mark_cancelled(reason);
                self.emit(run_id, stage, &label, index, total, ProgressKind::Cancelled).await;
                break;
            }

            if let Err(e) = state.mark_running(stage) {
                error!(%stage, error = %e, "Stage could not be started");
                break;
            }
            self.emit(run_id, stage, &label, index, total, ProgressKind::Started).await;

            let timer = SpanTimer::start();
            let stage_ctx = context.for_stage(stage, artifacts.clone());
            let result = self
                .run_stage(stage, &stage_ctx)
                .instrument(stage_span(stage, index, total))
                .await
                .and_then(|outcome| check_artifacts(stage, &artifacts, outcome));
            let duration_ms = timer.elapsed_ms();

            let (status, error, kind) = match result {
                Ok(outcome) => {
                    debug!(%stage, artifacts = outcome.artifacts.len(), duration_ms, "Stage completed");
                    artifacts = artifacts.merged(stage, outcome.artifacts);
                    (StageStatus::Completed, None, ProgressKind::Completed)
                }
                Err(e) if best_effort => {
                    warn!(%stage, error = %e, duration_ms, "Best-effort stage failed; continuing");
                    (StageStatus::SkippedBestEffort, Some(e), ProgressKind::Skipped)
                }
                Err(e) => {
                    error!(%stage, error = %e, duration_ms, "Stage failed; halting run");
                    (StageStatus::Failed, Some(e), ProgressKind::Failed)
                }
            };

            if let Err(e) = state.mark_finished(stage, status, error, duration_ms) {
                error!(%stage, error = %e, "Stage status could not be recorded");
                break;
            }
            self.emit(run_id, stage, &label, index, total, kind).await;

            if status != StageStatus::Completed && context.is_cancelled() {
                let reason = context
                    .cancellation()
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                warn!(%stage, reason = %reason, "Run cancelled while stage was running");
                state.mark_cancelled(reason);
                break;
            }
            if status == StageStatus::Failed {
                break;
            }
        }

        let result = state.into_result(run_id, artifacts, started_at);
        info!(
            status = ?result.status,
            duration_ms = run_timer.elapsed_ms(),
            "Workflow run finished"
        );
        result
    }

    /// Runs one stage under its timeout, turning panics and unsuccessful
    /// outcomes into errors.
    async fn run_stage(&self, stage: StageId, ctx: &RunContext) -> Result<StageOutcome, ExecutionError> {
        let implementation = self
            .stages
            .get(stage)
            .ok_or(ExecutionError::MissingImplementation { stage })?;
        let limit = self
            .timeout_for(stage, ctx.config())
            .map_err(|e| ExecutionError::StageFailed {
                stage,
                message: e.to_string(),
            })?;

        let call = AssertUnwindSafe(implementation.run(ctx)).catch_unwind();
        let caught = match limit {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ExecutionError::Timeout {
                    stage,
                    timeout_secs: limit.as_secs_f64(),
                })?,
            None => call.await,
        };

        let outcome = caught.map_err(|payload| ExecutionError::Panicked {
            stage,
            message: panic_message(payload.as_ref()),
        })?;

        if outcome.success {
            Ok(outcome)
        } else {
            Err(ExecutionError::StageFailed {
                stage,
                message: outcome.failure_message(),
            })
        }
    }

    /// `<stage>.timeout_secs`, then `stage_timeout_secs`, then the
    /// executor default.
    fn timeout_for(&self, stage: StageId, config: &RunConfig) -> Result<Option<Duration>, ConfigError> {
        match config.stage_timeout(stage)? {
            Some(limit) => Ok(Some(limit)),
            None => self.config.default_timeout(),
        }
    }

    async fn emit(&self, run_id: Uuid, stage: StageId, label: &str, index: usize, total: usize, kind: ProgressKind) {
        let event = ProgressEvent::new(run_id, stage, label, index, total, kind);
        self.sink.emit(&event).await;
    }
}

fn check_artifacts(stage: StageId, visible: &ArtifactSet, outcome: StageOutcome) -> Result<StageOutcome, ExecutionError> {
    match visible.first_conflict(&outcome.artifacts) {
        Some(name) => Err(ExecutionError::ArtifactConflict {
            stage,
            artifact: name.to_string(),
        }),
        None => Ok(outcome),
    }
}

/// Extracts the message of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::noop_stages;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_timeout_precedence() {
        let executor = Executor::new(noop_stages()).with_config(ExecutorConfig::new().with_default_timeout_secs(30.0));

        let none = RunConfig::new();
        assert_eq!(
            executor.timeout_for(StageId::Analysis, &none).unwrap(),
            Some(Duration::from_secs(30))
        );

        let global = RunConfig::new().with("stage_timeout_secs", 10.0);
        assert_eq!(
            executor.timeout_for(StageId::Analysis, &global).unwrap(),
            Some(Duration::from_secs(10))
        );

        let scoped = global.with("analysis.timeout_secs", 2.0);
        assert_eq!(
            executor.timeout_for(StageId::Analysis, &scoped).unwrap(),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            executor.timeout_for(StageId::Cleanup, &scoped).unwrap(),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_no_timeout_by_default() {
        let executor = Executor::new(noop_stages());
        assert_eq!(executor.timeout_for(StageId::Analysis, &RunConfig::new()).unwrap(), None);
    }

    #[test]
    fn test_validate_plan_accepts_resolved_plans() {
        let executor = Executor::new(noop_stages());
        let plan = resolve_plan(executor.registry(), &StageRequest::stages([6u32, 4])).unwrap();
        assert!(executor.validate_plan(&plan).is_ok());
    }

    #[test]
    fn test_check_plan() {
        let plan = resolve_plan(StageRegistry::canonical(), &StageRequest::All).unwrap();
        assert!(Executor::new(noop_stages()).check_plan(&plan).is_ok());

        let err = Executor::new(StageSet::new()).check_plan(&plan).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::MissingImplementation {
                stage: StageId::DataSelection
            }
        );
    }
}

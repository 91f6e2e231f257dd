//! End-to-end tests for plan execution.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::context::{RunConfig, RunContext};
    use crate::core::{ProgressKind, StageArtifact, StageFailure, StageOutcome, StageStatus, WorkflowStatus};
    use crate::errors::{ExecutionError, ValidationError};
    use crate::events::CollectingProgressSink;
    use crate::pipeline::{Executor, ExecutorConfig};
    use crate::registry::{StageDefinition, StageId, StageRegistry};
    use crate::roi::InMemoryRegionSource;
    use crate::stages::{FnStage, ProcessSingleCellStage, StageSet, TRACKING_ARTIFACT};
    use crate::testing::{
        assert_all_completed, assert_not_run, assert_stage_status, assert_workflow_status, noop_stages, region_at,
        FailingStage, MockStage, PanickingStage, SlowStage,
    };
    use crate::tracking::TrackingResult;
    use crate::workflow::{resolve_plan, StageRequest, WorkflowPlan};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn plan(stages: &[u32]) -> WorkflowPlan {
        resolve_plan(StageRegistry::canonical(), &StageRequest::stages(stages.iter().copied())).unwrap()
    }

    fn context() -> RunContext {
        RunContext::new(RunConfig::new())
    }

    #[tokio::test]
    async fn test_full_run_completes() {
        let executor = Executor::new(noop_stages());
        let result = executor.run(&StageRequest::All, context()).await.unwrap();

        assert_all_completed(&result);
        assert_eq!(result.stages.len(), 7);
        assert!(result.stages.iter().all(|r| r.duration_ms.is_some()));
        assert!(result.resume_request(executor.registry()).is_none());
    }

    #[tokio::test]
    async fn test_stages_run_in_canonical_order() {
        let sink = Arc::new(CollectingProgressSink::new());
        let executor = Executor::new(noop_stages()).with_progress_sink(sink.clone());

        let result = executor.run(&StageRequest::stages([6u32, 4]), context()).await.unwrap();
        assert_all_completed(&result);

        let started: Vec<(usize, usize, String)> = sink
            .events_of_kind(ProgressKind::Started)
            .into_iter()
            .map(|e| (e.index, e.total, e.label))
            .collect();
        assert_eq!(
            started,
            vec![
                (1, 2, "threshold_grouped_cells".to_string()),
                (2, 2, "analysis".to_string()),
            ]
        );
        assert_eq!(sink.len(), 4);
        assert!(sink.events().iter().all(|e| e.run_id == result.run_id));
    }

    #[tokio::test]
    async fn test_artifacts_visible_only_after_completion() {
        let selection = Arc::new(MockStage::producing(StageId::DataSelection, "selection"));
        let segmentation = Arc::new(MockStage::producing(StageId::Segmentation, "masks"));
        let mut stages = StageSet::new();
        stages.insert(selection.clone());
        stages.insert(segmentation.clone());

        let result = Executor::new(stages).execute(&plan(&[1, 2]), context()).await.unwrap();

        assert_all_completed(&result);
        assert_eq!(selection.seen_artifacts(), vec![Vec::<String>::new()]);
        assert_eq!(segmentation.seen_artifacts(), vec![vec!["selection".to_string()]]);
        assert_eq!(
            result.artifacts.get("masks").unwrap().produced_by,
            Some(StageId::Segmentation)
        );
    }

    #[tokio::test]
    async fn test_failure_halts_run() {
        let tail = Arc::new(MockStage::new(StageId::ProcessSingleCell));
        let mut stages = noop_stages().with(
            FailingStage::new(StageId::Segmentation, "segmentation tool crashed").with_partial_artifact("masks"),
        );
        stages.insert(tail.clone());

        let result = Executor::new(stages).execute(&plan(&[1, 2, 3]), context()).await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Failed);
        assert_stage_status(&result, StageId::DataSelection, StageStatus::Completed);
        assert_stage_status(&result, StageId::Segmentation, StageStatus::Failed);
        assert_not_run(&result, &[StageId::ProcessSingleCell]);
        assert_eq!(tail.call_count(), 0);
        assert!(!result.artifacts.contains("masks"));
        assert_eq!(
            result.failure(),
            Some(&ExecutionError::StageFailed {
                stage: StageId::Segmentation,
                message: "segmentation tool crashed".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_resume_after_failure() {
        let stages = noop_stages().with(FailingStage::new(StageId::ThresholdGroupedCells, "no threshold"));
        let executor = Executor::new(stages);

        let result = executor.execute(&plan(&[3, 4, 5, 6]), context()).await.unwrap();
        let resume = result.resume_request(executor.registry()).unwrap();
        assert_eq!(
            resume,
            StageRequest::stages([
                StageId::ProcessSingleCell,
                StageId::ThresholdGroupedCells,
                StageId::MeasureRoiArea,
                StageId::Analysis,
            ])
        );

        let rerun = Executor::new(noop_stages()).run(&resume, context()).await.unwrap();
        assert_all_completed(&rerun);
        assert_eq!(
            rerun.plan.ids(),
            &[
                StageId::ProcessSingleCell,
                StageId::ThresholdGroupedCells,
                StageId::MeasureRoiArea,
                StageId::Analysis
            ]
        );
    }

    #[tokio::test]
    async fn test_best_effort_failure_continues() {
        let mut builder = StageRegistry::builder();
        builder
            .register(StageDefinition::new(StageId::Cleanup, 1).best_effort())
            .unwrap()
            .register(StageDefinition::new(StageId::Analysis, 2))
            .unwrap();
        let registry = builder.close().unwrap();

        let analysis = Arc::new(MockStage::new(StageId::Analysis));
        let mut stages = StageSet::new().with(FailingStage::new(StageId::Cleanup, "disk busy"));
        stages.insert(analysis.clone());
        let sink = Arc::new(CollectingProgressSink::new());

        let executor = Executor::new(stages)
            .with_registry(registry)
            .with_progress_sink(sink.clone());
        let result = executor.run(&StageRequest::All, context()).await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Completed);
        assert_stage_status(&result, StageId::Cleanup, StageStatus::SkippedBestEffort);
        assert_stage_status(&result, StageId::Analysis, StageStatus::Completed);
        assert_eq!(analysis.call_count(), 1);
        assert_eq!(sink.events_of_kind(ProgressKind::Skipped).len(), 1);
        assert!(result.failure().is_none());
    }

    #[tokio::test]
    async fn test_canonical_cleanup_is_best_effort() {
        let stages = noop_stages().with(FailingStage::new(StageId::Cleanup, "locked"));
        let result = Executor::new(stages).execute(&plan(&[4, 6, 7]), context()).await.unwrap();

        assert!(result.is_success());
        assert_stage_status(&result, StageId::Cleanup, StageStatus::SkippedBestEffort);
    }

    #[tokio::test]
    async fn test_timeout_fails_stage() {
        let stages = noop_stages().with(SlowStage::with_delay_ms(StageId::ThresholdGroupedCells, 2_000));
        let config = RunConfig::new().with("threshold_grouped_cells.timeout_secs", 0.05);

        let result = Executor::new(stages)
            .execute(&plan(&[4, 6]), RunContext::new(config))
            .await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Failed);
        assert_not_run(&result, &[StageId::Analysis]);
        assert!(matches!(
            result.failure(),
            Some(ExecutionError::Timeout {
                stage: StageId::ThresholdGroupedCells,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_executor_default_timeout() {
        let stages = noop_stages().with(SlowStage::with_delay_ms(StageId::DataSelection, 2_000));
        let executor = Executor::new(stages).with_config(ExecutorConfig::new().with_default_timeout_secs(0.05));

        let result = executor.execute(&plan(&[1]), context()).await.unwrap();
        assert_stage_status(&result, StageId::DataSelection, StageStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_timeout_fails_stage() {
        let config = RunConfig::new().with("stage_timeout_secs", -3);
        let result = Executor::new(noop_stages())
            .execute(&plan(&[1]), RunContext::new(config))
            .await.unwrap();

        assert!(matches!(
            result.failure(),
            Some(ExecutionError::StageFailed {
                stage: StageId::DataSelection,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_panic_reported_as_failure() {
        let stages = noop_stages().with(PanickingStage::new(StageId::DataSelection, "index out of range"));
        let result = Executor::new(stages).execute(&plan(&[1, 2]), context()).await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Failed);
        assert_eq!(
            result.failure(),
            Some(&ExecutionError::Panicked {
                stage: StageId::DataSelection,
                message: "index out of range".to_string(),
            })
        );
        assert_not_run(&result, &[StageId::Segmentation]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel("user abort");
        let sink = Arc::new(CollectingProgressSink::new());

        let result = Executor::new(noop_stages())
            .with_progress_sink(sink.clone())
            .execute(&plan(&[1, 2]), context().with_cancellation(token))
            .await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Cancelled);
        assert_not_run(&result, &[StageId::DataSelection, StageId::Segmentation]);
        assert_eq!(result.cancel_reason.as_deref(), Some("user abort"));
        assert_eq!(sink.events_of_kind(ProgressKind::Cancelled).len(), 1);
        assert!(sink.events_of_kind(ProgressKind::Started).is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let stages = noop_stages().with(FnStage::new(StageId::DataSelection, |ctx: &RunContext| {
            ctx.cancellation().cancel("operator stopped the run");
            StageOutcome::ok()
        }));

        let result = Executor::new(stages).execute(&plan(&[1, 2]), context()).await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Cancelled);
        assert_stage_status(&result, StageId::DataSelection, StageStatus::Completed);
        assert_not_run(&result, &[StageId::Segmentation]);
        assert!(result.resume_request(StageRegistry::canonical()).is_some());
    }

    #[tokio::test]
    async fn test_cancellation_during_stage_cancels_run() {
        let stages = noop_stages().with(FnStage::new(StageId::DataSelection, |ctx: &RunContext| {
            ctx.cancellation().cancel("operator stopped the run");
            StageOutcome::failure(StageFailure::new("cancelled", "interrupted by cancellation"))
        }));

        let result = Executor::new(stages).execute(&plan(&[1, 2]), context()).await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Cancelled);
        assert_stage_status(&result, StageId::DataSelection, StageStatus::Failed);
        assert_not_run(&result, &[StageId::Segmentation]);
        assert_eq!(result.cancel_reason.as_deref(), Some("operator stopped the run"));
    }

    #[tokio::test]
    async fn test_cancellation_during_last_best_effort_stage() {
        let stages = noop_stages().with(FnStage::new(StageId::Cleanup, |ctx: &RunContext| {
            ctx.cancellation().cancel("shutdown");
            StageOutcome::fail("interrupted")
        }));

        let result = Executor::new(stages).execute(&plan(&[4, 6, 7]), context()).await.unwrap();

        assert_workflow_status(&result, WorkflowStatus::Cancelled);
        assert_stage_status(&result, StageId::Cleanup, StageStatus::SkippedBestEffort);
    }

    #[tokio::test]
    async fn test_stored_plan_is_revalidated() {
        let analysis = Arc::new(MockStage::new(StageId::Analysis));
        let mut stages = noop_stages();
        stages.insert(analysis.clone());
        let executor = Executor::new(stages);

        let missing: WorkflowPlan = serde_json::from_str(r#"{"stages":["analysis","measure_roi_area"]}"#).unwrap();
        assert_eq!(
            executor.execute(&missing, context()).await.unwrap_err(),
            ValidationError::MissingDependency {
                stage: StageId::MeasureRoiArea,
                missing: StageId::ProcessSingleCell,
            }
        );

        let reordered: WorkflowPlan =
            serde_json::from_str(r#"{"stages":["analysis","threshold_grouped_cells"]}"#).unwrap();
        assert_eq!(
            executor.execute(&reordered, context()).await.unwrap_err(),
            ValidationError::UnresolvedPlan {
                stages: vec![StageId::Analysis, StageId::ThresholdGroupedCells],
                expected: vec![StageId::ThresholdGroupedCells, StageId::Analysis],
            }
        );
        assert_eq!(analysis.call_count(), 0);
    }

    #[tokio::test]
    async fn test_plan_from_another_registry_is_rejected() {
        let mut builder = StageRegistry::builder();
        builder.register(StageDefinition::new(StageId::Analysis, 1)).unwrap();
        let registry = builder.close().unwrap();

        let executor = Executor::new(noop_stages()).with_registry(registry);
        let err = executor.execute(&plan(&[4, 6]), context()).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnknownStage { .. }));
    }

    #[tokio::test]
    async fn test_missing_implementation() {
        let stages = StageSet::new().with(MockStage::new(StageId::DataSelection));
        let executor = Executor::new(stages);
        let plan = plan(&[1, 2]);

        assert!(executor.check_plan(&plan).is_err());
        let result = executor.execute(&plan, context()).await.unwrap();

        assert_stage_status(&result, StageId::DataSelection, StageStatus::Completed);
        assert_eq!(
            result.failure(),
            Some(&ExecutionError::MissingImplementation {
                stage: StageId::Segmentation
            })
        );
    }

    #[tokio::test]
    async fn test_artifact_conflict_fails_stage() {
        let stages = noop_stages()
            .with(MockStage::producing(StageId::ThresholdGroupedCells, "summary"))
            .with(MockStage::producing(StageId::Analysis, "summary"));

        let result = Executor::new(stages).execute(&plan(&[4, 6]), context()).await.unwrap();

        assert_eq!(
            result.failure(),
            Some(&ExecutionError::ArtifactConflict {
                stage: StageId::Analysis,
                artifact: "summary".to_string(),
            })
        );
        assert_eq!(
            result.artifacts.get("summary").unwrap().produced_by,
            Some(StageId::ThresholdGroupedCells)
        );
    }

    #[tokio::test]
    async fn test_seeded_artifacts_visible() {
        let analysis = Arc::new(MockStage::new(StageId::Analysis));
        let mut stages = noop_stages();
        stages.insert(analysis.clone());
        let seeded = crate::core::ArtifactSet::from_artifacts([StageArtifact::new(
            "thresholds",
            "json",
            serde_json::json!([0.5]),
        )]);

        Executor::new(stages)
            .execute(&plan(&[4, 6]), context().with_artifacts(seeded))
            .await.unwrap();

        assert_eq!(analysis.seen_artifacts(), vec![vec!["thresholds".to_string()]]);
    }

    #[tokio::test]
    async fn test_invalid_request_runs_nothing() {
        let mock = Arc::new(MockStage::new(StageId::MeasureRoiArea));
        let mut stages = StageSet::new();
        stages.insert(mock.clone());

        let err = Executor::new(stages)
            .run(&StageRequest::stages([5u32]), context())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::MissingDependency {
                stage: StageId::MeasureRoiArea,
                missing: StageId::ProcessSingleCell,
            }
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_configured_uses_stages_option() {
        let config = RunConfig::new().with("stages", "analysis, 4");
        let result = Executor::new(noop_stages())
            .run_configured(RunContext::new(config))
            .await
            .unwrap();
        assert_eq!(
            result.plan.ids(),
            &[StageId::ThresholdGroupedCells, StageId::Analysis]
        );

        let all = Executor::new(noop_stages()).run_configured(context()).await.unwrap();
        assert_eq!(all.plan.len(), 7);

        let bad = RunConfig::new().with("stages", "5");
        assert!(Executor::new(noop_stages())
            .run_configured(RunContext::new(bad))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_single_cell_stage_in_workflow() {
        let source = InMemoryRegionSource::new(vec![
            region_at("a", 0, 10.0, 10.0),
            region_at("b", 0, 50.0, 50.0),
            region_at("a2", 1, 12.0, 11.0),
            region_at("b2", 1, 51.0, 49.0),
        ]);
        let stages = noop_stages().with(ProcessSingleCellStage::new(Arc::new(source)));

        let result = Executor::new(stages).execute(&plan(&[3, 5]), context()).await.unwrap();
        assert_all_completed(&result);

        let tracking: TrackingResult = result.artifacts.get(TRACKING_ARTIFACT).unwrap().decode().unwrap();
        assert_eq!(tracking.tracks.len(), 2);
        assert_eq!(tracking.tracks[0].len(), 2);
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let result = Executor::new(noop_stages()).execute(&plan(&[1, 2]), context()).await.unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: crate::workflow::WorkflowResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.plan, result.plan);
        assert_eq!(back.plan_fingerprint, result.plan_fingerprint);
        assert_eq!(
            back.stages.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![StageStatus::Completed, StageStatus::Completed]
        );
    }
}

//! The single-cell processing stage: region tracking followed by the
//! per-cell sub-steps that run in external tools.

use super::Stage;
use crate::context::RunContext;
use crate::core::{StageArtifact, StageFailure, StageOutcome};
use crate::registry::StageId;
use crate::roi::RegionSource;
use crate::tracking::{track_groups, TrackingConfig, TrackingResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the artifact holding the [`TrackingResult`].
pub const TRACKING_ARTIFACT: &str = "tracking_result";

/// The sub-steps that follow tracking.
///
/// Implementations drive the image-processing engine (resizing ROIs,
/// duplicating them per channel, cropping cells). Errors are folded into
/// the stage failure message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SingleCellSteps: Send + Sync {
    /// Resizes the tracked regions.
    async fn resize_regions(&self, ctx: &RunContext, tracking: &TrackingResult) -> anyhow::Result<()>;

    /// Copies the regions onto every analysis channel.
    async fn duplicate_regions_for_channels(&self, ctx: &RunContext) -> anyhow::Result<()>;

    /// Crops one image per cell.
    async fn extract_cells(&self, ctx: &RunContext) -> anyhow::Result<()>;
}

/// Sub-steps that do nothing, for runs that only need tracking.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalSteps;

#[async_trait]
impl SingleCellSteps for NoExternalSteps {
    async fn resize_regions(&self, _ctx: &RunContext, _tracking: &TrackingResult) -> anyhow::Result<()> {
        Ok(())
    }

    async fn duplicate_regions_for_channels(&self, _ctx: &RunContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn extract_cells(&self, _ctx: &RunContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Loads regions, tracks them per group and runs the per-cell sub-steps.
///
/// Emits the [`TRACKING_ARTIFACT`] artifact. Groups with malformed regions
/// are reported in the artifact but do not fail the stage.
pub struct ProcessSingleCellStage {
    source: Arc<dyn RegionSource>,
    steps: Arc<dyn SingleCellSteps>,
}

impl ProcessSingleCellStage {
    /// Creates the stage with no external sub-steps.
    #[must_use]
    pub fn new(source: Arc<dyn RegionSource>) -> Self {
        Self {
            source,
            steps: Arc::new(NoExternalSteps),
        }
    }

    /// Sets the sub-steps run after tracking.
    #[must_use]
    pub fn with_steps(mut self, steps: Arc<dyn SingleCellSteps>) -> Self {
        self.steps = steps;
        self
    }

    async fn track(&self, ctx: &RunContext) -> Result<TrackingResult, StageFailure> {
        let config = TrackingConfig::from_run_config(ctx.config())
            .map_err(|e| StageFailure::new("invalid_config", e.to_string()))?;

        let regions = self
            .source
            .load_regions()
            .await
            .map_err(|e| StageFailure::from(e.context("loading regions")))?;

        let result = track_groups(&regions, config.max_distance)
            .map_err(|e| StageFailure::new("invalid_config", e.to_string()))?;

        let summary = result.summary();
        info!(
            groups = summary.groups,
            tracks = summary.tracks,
            regions = summary.regions,
            max_distance = config.max_distance,
            "Tracked regions"
        );
        for report in result.untracked_groups() {
            warn!(group = %report.group, "Group could not be tracked");
        }
        Ok(result)
    }

    async fn run_steps(&self, ctx: &RunContext, tracking: &TrackingResult) -> Result<(), StageFailure> {
        let failed = |step: &str| {
            let step = step.to_string();
            move |e: anyhow::Error| {
                StageFailure::new("sub_step_failed", format!("{step}: {e:#}")).with_detail("step", json!(step))
            }
        };

        self.steps
            .resize_regions(ctx, tracking)
            .await
            .map_err(failed("resize_regions"))?;
        self.steps
            .duplicate_regions_for_channels(ctx)
            .await
            .map_err(failed("duplicate_regions_for_channels"))?;
        self.steps.extract_cells(ctx).await.map_err(failed("extract_cells"))?;
        Ok(())
    }
}

impl std::fmt::Debug for ProcessSingleCellStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSingleCellStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ProcessSingleCellStage {
    fn id(&self) -> StageId {
        StageId::ProcessSingleCell
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let tracking = match self.track(ctx).await {
            Ok(tracking) => tracking,
            Err(failure) => return StageOutcome::failure(failure),
        };

        if let Err(failure) = self.run_steps(ctx, &tracking).await {
            return StageOutcome::failure(failure);
        }

        match StageArtifact::from_serializable(TRACKING_ARTIFACT, "tracking", &tracking) {
            Ok(artifact) => StageOutcome::ok_with(vec![artifact]),
            Err(e) => StageOutcome::failure(StageFailure::new("serialization", e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunConfig;
    use crate::roi::{GroupKey, InMemoryRegionSource, MockRegionSource};
    use crate::testing::{degenerate_region_in, region_in};
    use mockall::Sequence;

    fn key(region: &str) -> GroupKey {
        GroupKey::new("Dish_1", region, "ch00")
    }

    fn source() -> Arc<dyn RegionSource> {
        Arc::new(InMemoryRegionSource::new(vec![
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            region_in(&key("R_1"), "a1", 1, 2.0, 0.0),
            degenerate_region_in(&key("R_2"), "b0", 0),
        ]))
    }

    #[tokio::test]
    async fn test_tracking_artifact_is_emitted() {
        let stage = ProcessSingleCellStage::new(source());
        let outcome = stage.run(&RunContext::new(RunConfig::new())).await;

        assert!(outcome.success, "{:?}", outcome.error);
        let tracking: TrackingResult = outcome.artifacts[0].decode().unwrap();
        assert_eq!(outcome.artifacts[0].name, TRACKING_ARTIFACT);
        assert_eq!(tracking.track_of(&key("R_1"), "a0"), tracking.track_of(&key("R_1"), "a1"));
        assert_eq!(tracking.untracked_groups().count(), 1);
    }

    #[tokio::test]
    async fn test_max_distance_comes_from_config() {
        let stage = ProcessSingleCellStage::new(source());
        let outcome = stage
            .run(&RunContext::new(RunConfig::new().with("max_distance", 1.0)))
            .await;

        let tracking: TrackingResult = outcome.artifacts[0].decode().unwrap();
        assert_ne!(tracking.track_of(&key("R_1"), "a0"), tracking.track_of(&key("R_1"), "a1"));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_stage() {
        let stage = ProcessSingleCellStage::new(source());
        let outcome = stage
            .run(&RunContext::new(RunConfig::new().with("max_distance", -3.0)))
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "invalid_config");
    }

    #[tokio::test]
    async fn test_source_error_fails_stage() {
        let mut source = MockRegionSource::new();
        source
            .expect_load_regions()
            .returning(|| Err(anyhow::anyhow!("no such archive")));

        let outcome = ProcessSingleCellStage::new(Arc::new(source))
            .run(&RunContext::new(RunConfig::new()))
            .await;

        assert!(!outcome.success);
        assert!(outcome.failure_message().contains("no such archive"));
    }

    #[tokio::test]
    async fn test_sub_steps_run_in_order_after_tracking() {
        let mut steps = MockSingleCellSteps::new();
        let mut seq = Sequence::new();
        steps
            .expect_resize_regions()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, tracking| tracking.tracks.len() == 2)
            .returning(|_, _| Ok(()));
        steps
            .expect_duplicate_regions_for_channels()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        steps
            .expect_extract_cells()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let stage = ProcessSingleCellStage::new(source()).with_steps(Arc::new(steps));
        assert!(stage.run(&RunContext::new(RunConfig::new())).await.success);
    }

    #[tokio::test]
    async fn test_failing_sub_step_stops_the_stage() {
        let mut steps = MockSingleCellSteps::new();
        steps.expect_resize_regions().returning(|_, _| Ok(()));
        steps
            .expect_duplicate_regions_for_channels()
            .returning(|_| Err(anyhow::anyhow!("macro exited with 1")));
        steps.expect_extract_cells().times(0);

        let stage = ProcessSingleCellStage::new(source()).with_steps(Arc::new(steps));
        let outcome = stage.run(&RunContext::new(RunConfig::new())).await;

        assert!(!outcome.success);
        assert!(outcome.artifacts.is_empty());
        let failure = outcome.error.unwrap();
        assert_eq!(failure.code, "sub_step_failed");
        assert_eq!(failure.details["step"], "duplicate_regions_for_channels");
    }
}

//! The read-only context handed to every stage.

use super::RunConfig;
use crate::cancellation::CancellationToken;
use crate::core::{ArtifactSet, StageArtifact};
use crate::registry::StageId;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a stage may read while it runs.
///
/// A stage sees the run configuration and the artifacts of the stages that
/// completed before it. The executor builds a fresh view per stage; stages
/// never mutate it.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    config: Arc<RunConfig>,
    artifacts: ArtifactSet,
    cancel: CancellationToken,
    stage: Option<StageId>,
}

impl RunContext {
    /// Creates a context for a new run with a fresh run id.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self {
            run_id: crate::utils::new_run_id(),
            config: Arc::new(config),
            artifacts: ArtifactSet::new(),
            cancel: CancellationToken::new(),
            stage: None,
        }
    }

    /// Uses an existing run id.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Seeds the run with artifacts produced elsewhere.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: ArtifactSet) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Returns the view a stage receives.
    #[must_use]
    pub(crate) fn for_stage(&self, stage: StageId, artifacts: ArtifactSet) -> Self {
        Self {
            run_id: self.run_id,
            config: Arc::clone(&self.config),
            artifacts,
            cancel: self.cancel.clone(),
            stage: Some(stage),
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the run configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Returns the artifacts visible to the current stage.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Looks up one artifact.
    #[must_use]
    pub fn artifact(&self, name: &str) -> Option<&StageArtifact> {
        self.artifacts.get(name)
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the stage this view was built for.
    #[must_use]
    pub fn stage(&self) -> Option<StageId> {
        self.stage
    }
}

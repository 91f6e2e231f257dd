//! The stage contract and built-in stages.
//!
//! A stage is the unit of work the executor schedules. Stages that drive
//! external tools keep those tools behind this trait, so the scheduler and
//! the tracker can be exercised with fake stages.

mod external;
mod single_cell;

pub use external::ExternalCommandStage;
pub use single_cell::{NoExternalSteps, ProcessSingleCellStage, SingleCellSteps, TRACKING_ARTIFACT};

use crate::context::RunContext;
use crate::core::StageOutcome;
use crate::registry::StageId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A unit of work bound to one stage id.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage this implementation runs for.
    fn id(&self) -> StageId;

    /// Runs the stage.
    ///
    /// Failures are reported through the outcome; panics are caught by the
    /// executor and reported as failures too.
    async fn run(&self, ctx: &RunContext) -> StageOutcome;
}

/// A stage backed by a synchronous closure.
pub struct FnStage<F>
where
    F: Fn(&RunContext) -> StageOutcome + Send + Sync,
{
    id: StageId,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&RunContext) -> StageOutcome + Send + Sync,
{
    /// Creates a closure stage.
    pub fn new(id: StageId, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&RunContext) -> StageOutcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&RunContext) -> StageOutcome + Send + Sync,
{
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        (self.func)(ctx)
    }
}

/// A stage that succeeds without doing anything.
#[derive(Debug, Clone, Copy)]
pub struct NoOpStage {
    id: StageId,
}

impl NoOpStage {
    /// Creates a no-op stage.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: &RunContext) -> StageOutcome {
        StageOutcome::ok()
    }
}

/// The implementations available to an executor, one per stage id.
#[derive(Debug, Clone, Default)]
pub struct StageSet {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl StageSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a stage under its own id, replacing any earlier binding.
    #[must_use]
    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.insert(Arc::new(stage));
        self
    }

    /// Binds a shared stage under its own id. Returns the replaced binding.
    pub fn insert(&mut self, stage: Arc<dyn Stage>) -> Option<Arc<dyn Stage>> {
        self.stages.insert(stage.id(), stage)
    }

    /// Returns the implementation of a stage.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<&Arc<dyn Stage>> {
        self.stages.get(&id)
    }

    /// Returns true if the stage has an implementation.
    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }

    /// Returns the number of bound stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

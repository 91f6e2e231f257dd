//! # Cellflow
//!
//! Stage orchestration and cell region tracking for microscopy analysis
//! workflows.
//!
//! Cellflow provides:
//!
//! - **A fixed stage registry**: seven analysis stages with canonical order
//!   and prerequisites
//! - **Plan resolution**: turning a user's stage selection into an ordered,
//!   validated plan
//! - **Sequential execution**: fail-fast runs with per-stage timeouts,
//!   cancellation and progress events
//! - **Region tracking**: greedy nearest-centroid linking of cell outlines
//!   across timepoints
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cellflow::prelude::*;
//!
//! let stages = StageSet::new()
//!     .with(ProcessSingleCellStage::new(source))
//!     .with(ExternalCommandStage::new(StageId::Segmentation, "segment-cells"));
//!
//! let executor = Executor::new(stages);
//! let result = executor.run(&StageRequest::parse("3,5")?, RunContext::new(config)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod geometry;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod roi;
pub mod stages;
pub mod testing;
pub mod tracking;
pub mod utils;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{RunConfig, RunContext};
    pub use crate::core::{
        ArtifactSet, ProgressEvent, ProgressKind, StageArtifact, StageFailure, StageOutcome, StageStatus,
        WorkflowStatus,
    };
    pub use crate::errors::{
        CellflowError, ConfigError, ContractErrorInfo, DataError, ExecutionError, RegistryError, TrackingError,
        ValidationError,
    };
    pub use crate::events::{CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink};
    pub use crate::geometry::Point;
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::pipeline::{Executor, ExecutorConfig};
    pub use crate::registry::{StageDefinition, StageId, StageRegistry};
    pub use crate::roi::{GroupKey, InMemoryRegionSource, Region, RegionCoordinates, RegionSource};
    pub use crate::stages::{
        ExternalCommandStage, NoOpStage, ProcessSingleCellStage, SingleCellSteps, Stage, StageSet,
    };
    pub use crate::tracking::{track_groups, track_regions, Frame, TrackId, TrackingConfig, TrackingResult};
    pub use crate::workflow::{resolve_plan, StageRequest, WorkflowPlan, WorkflowResult, WorkflowState};
}

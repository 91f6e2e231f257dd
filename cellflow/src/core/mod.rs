//! Core domain model types for cellflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage and workflow status enums
//! - The stage outcome returned by every stage
//! - Stage artifacts and progress events

mod artifact;
mod event;
mod outcome;
mod status;

pub use artifact::{ArtifactSet, StageArtifact};
pub use event::{ProgressEvent, ProgressKind};
pub use outcome::{StageFailure, StageOutcome};
pub use status::{StageStatus, WorkflowStatus};

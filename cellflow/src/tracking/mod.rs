//! Region tracking across timepoints.
//!
//! [`track_regions`] links the regions of one group frame by frame;
//! [`track_groups`] runs it for every group of a region set and isolates
//! groups with malformed input.

mod config;
mod groups;
mod result;
mod tracker;

pub use config::TrackingConfig;
pub use groups::track_groups;
pub use result::{GroupOutcome, GroupReport, Track, TrackId, TrackPoint, TrackingResult, TrackingSummary};
pub use tracker::{greedy_match, track_regions, Frame};

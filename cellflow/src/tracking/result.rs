//! Tracking output: tracks, per-group outcomes and summary figures.

use crate::errors::DataError;
use crate::geometry::Point;
use crate::roi::{GroupKey, Region};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track_{}", self.0)
    }
}

/// One observation of a tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Timepoint of the observation.
    pub timepoint: u32,
    /// The observed region.
    pub region_id: String,
    /// Centroid used for matching, absent for untracked groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Point>,
}

/// The observations believed to be the same cell, by increasing timepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track id, unique within a result.
    pub id: TrackId,
    /// Group the track belongs to.
    pub group: GroupKey,
    /// Observations; timepoints strictly increase.
    pub points: Vec<TrackPoint>,
}

impl Track {
    pub(crate) fn start(id: TrackId, timepoint: u32, region: &Region, centroid: Option<Point>) -> Self {
        Self {
            id,
            group: region.group_key(),
            points: vec![TrackPoint {
                timepoint,
                region_id: region.id.clone(),
                centroid,
            }],
        }
    }

    pub(crate) fn extend(&mut self, timepoint: u32, region: &Region, centroid: Point) {
        self.points.push(TrackPoint {
            timepoint,
            region_id: region.id.clone(),
            centroid: Some(centroid),
        });
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a track has at least one observation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First timepoint.
    #[must_use]
    pub fn start_timepoint(&self) -> Option<u32> {
        self.points.first().map(|p| p.timepoint)
    }

    /// Last timepoint.
    #[must_use]
    pub fn end_timepoint(&self) -> Option<u32> {
        self.points.last().map(|p| p.timepoint)
    }

    /// Returns the `(timepoint, region id)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (u32, &str)> {
        self.points.iter().map(|p| (p.timepoint, p.region_id.as_str()))
    }
}

/// How a group fared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    /// Regions were matched across timepoints.
    Tracked,
    /// A region was malformed; every region got its own track.
    Untracked {
        /// Why tracking was skipped.
        error: DataError,
    },
}

/// Per-group account of a tracking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// The group.
    pub group: GroupKey,
    /// What happened.
    pub outcome: GroupOutcome,
    /// Number of regions in the group.
    pub region_count: usize,
    /// Number of tracks produced for the group.
    pub track_count: usize,
}

impl GroupReport {
    /// Returns true if the group was tracked.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Tracked)
    }
}

/// Tracks plus the outcome of every group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    /// Every track, in id order.
    pub tracks: Vec<Track>,
    /// One report per group, in group order.
    pub groups: Vec<GroupReport>,
}

impl TrackingResult {
    /// Returns the track holding a region.
    #[must_use]
    pub fn track_of(&self, group: &GroupKey, region_id: &str) -> Option<TrackId> {
        self.tracks
            .iter()
            .filter(|t| &t.group == group)
            .find(|t| t.points.iter().any(|p| p.region_id == region_id))
            .map(|t| t.id)
    }

    /// Returns the region id -> track id map of one group.
    #[must_use]
    pub fn assignments(&self, group: &GroupKey) -> BTreeMap<&str, TrackId> {
        self.tracks
            .iter()
            .filter(|t| &t.group == group)
            .flat_map(|t| t.points.iter().map(move |p| (p.region_id.as_str(), t.id)))
            .collect()
    }

    /// Looks up a track by id.
    #[must_use]
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Returns the report of a group.
    #[must_use]
    pub fn group(&self, group: &GroupKey) -> Option<&GroupReport> {
        self.groups.iter().find(|g| &g.group == group)
    }

    /// Returns the groups that could not be tracked.
    pub fn untracked_groups(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|g| !g.is_tracked())
    }

    /// Computes summary figures.
    #[must_use]
    pub fn summary(&self) -> TrackingSummary {
        let regions: usize = self.tracks.iter().map(Track::len).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean_track_length = if self.tracks.is_empty() {
            0.0
        } else {
            regions as f64 / self.tracks.len() as f64
        };

        TrackingSummary {
            groups: self.groups.len(),
            untracked_groups: self.untracked_groups().count(),
            tracks: self.tracks.len(),
            regions,
            mean_track_length,
            longest_track: self.tracks.iter().map(Track::len).max().unwrap_or(0),
        }
    }
}

/// Headline numbers of a tracking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSummary {
    /// Groups seen.
    pub groups: usize,
    /// Groups that fell back to one track per region.
    pub untracked_groups: usize,
    /// Tracks produced.
    pub tracks: usize,
    /// Regions assigned.
    pub regions: usize,
    /// Mean number of observations per track.
    pub mean_track_length: f64,
    /// Observations in the longest track.
    pub longest_track: usize,
}

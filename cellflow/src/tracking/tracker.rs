//! Greedy nearest-centroid tracking of one group across timepoints.
//!
//! For every pair of consecutive frames all candidate pairs within
//! `max_distance` are ranked by distance, then by the index of the later
//! region, then by the index of the earlier region. Pairs are accepted in
//! that order while both regions are free. The policy is deterministic but
//! not a minimum-cost assignment.

use super::config::validate_max_distance;
use super::result::{GroupOutcome, GroupReport, Track, TrackId, TrackingResult};
use crate::errors::{DataError, TrackingError};
use crate::geometry::Point;
use crate::roi::Region;
use std::collections::HashSet;
use tracing::trace;

/// The regions observed at one timepoint.
#[derive(Debug, Clone, Default)]
pub struct Frame<'a> {
    /// The timepoint.
    pub timepoint: u32,
    /// Regions in a stable order; the order breaks distance ties.
    pub regions: Vec<&'a Region>,
}

impl<'a> Frame<'a> {
    /// Creates a frame.
    #[must_use]
    pub fn new(timepoint: u32, regions: impl IntoIterator<Item = &'a Region>) -> Self {
        Self {
            timepoint,
            regions: regions.into_iter().collect(),
        }
    }

    /// Creates a frame with no regions.
    #[must_use]
    pub fn empty(timepoint: u32) -> Self {
        Self {
            timepoint,
            regions: Vec::new(),
        }
    }

    /// Returns true if the frame has no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Tracks the regions of one group.
///
/// `frames` must be ordered by strictly increasing timepoint. Track ids are
/// assigned from 0 in creation order (frame order, then region order), so
/// identical inputs always produce identical ids.
///
/// # Errors
///
/// Returns [`TrackingError::Config`] for a negative or non-finite
/// `max_distance`, and [`TrackingError::Data`] for a malformed region, a
/// repeated region id or out-of-order frames.
pub fn track_regions(frames: &[Frame<'_>], max_distance: f64) -> Result<TrackingResult, TrackingError> {
    let tracks = track_frames(frames, max_distance, 0)?;

    let groups = frames
        .iter()
        .find_map(|f| f.regions.first())
        .map(|first| GroupReport {
            group: first.group_key(),
            outcome: GroupOutcome::Tracked,
            region_count: frames.iter().map(|f| f.regions.len()).sum(),
            track_count: tracks.len(),
        })
        .into_iter()
        .collect();

    Ok(TrackingResult { tracks, groups })
}

/// Runs a tracking pass, numbering tracks from `first_id`.
pub(crate) fn track_frames(
    frames: &[Frame<'_>],
    max_distance: f64,
    first_id: u32,
) -> Result<Vec<Track>, TrackingError> {
    validate_max_distance(max_distance)?;
    check_frames(frames)?;

    let centroids = frames
        .iter()
        .map(|frame| frame.regions.iter().map(|r| r.centroid()).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut tracks: Vec<Track> = Vec::new();
    let mut next_id = first_id;
    // Slot in `tracks` of each region of the previous frame.
    let mut tails: Vec<usize> = Vec::new();

    for (f, frame) in frames.iter().enumerate() {
        let current = &centroids[f];
        let matches = match f.checked_sub(1) {
            Some(prev) => greedy_match(&centroids[prev], current, max_distance),
            None => vec![None; current.len()],
        };

        let mut next_tails = Vec::with_capacity(current.len());
        for (j, region) in frame.regions.iter().enumerate() {
            let slot = if let Some(i) = matches[j] {
                let slot = tails[i];
                tracks[slot].extend(frame.timepoint, region, current[j]);
                slot
            } else {
                tracks.push(Track::start(TrackId(next_id), frame.timepoint, region, Some(current[j])));
                next_id += 1;
                tracks.len() - 1
            };
            next_tails.push(slot);
        }

        trace!(
            timepoint = frame.timepoint,
            regions = current.len(),
            matched = matches.iter().flatten().count(),
            "Tracked frame"
        );
        tails = next_tails;
    }

    Ok(tracks)
}

/// Matches the regions of two consecutive frames.
///
/// Returns, for every region of `next`, the index of its predecessor in
/// `previous`, if any.
#[must_use]
pub fn greedy_match(previous: &[Point], next: &[Point], max_distance: f64) -> Vec<Option<usize>> {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (j, b) in next.iter().enumerate() {
        for (i, a) in previous.iter().enumerate() {
            let distance = a.distance(*b);
            if distance <= max_distance {
                candidates.push((distance, j, i));
            }
        }
    }
    candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut taken = vec![false; previous.len()];
    let mut matched = vec![None; next.len()];
    for (_, j, i) in candidates {
        if matched[j].is_none() && !taken[i] {
            matched[j] = Some(i);
            taken[i] = true;
        }
    }
    matched
}

fn check_frames(frames: &[Frame<'_>]) -> Result<(), DataError> {
    for pair in frames.windows(2) {
        if pair[1].timepoint <= pair[0].timepoint {
            return Err(DataError::NonMonotonicTimepoints {
                previous: pair[0].timepoint,
                next: pair[1].timepoint,
            });
        }
    }

    let mut seen = HashSet::new();
    for region in frames.iter().flat_map(|f| f.regions.iter()) {
        if !seen.insert(region.id.as_str()) {
            return Err(DataError::DuplicateRegion {
                region_id: region.id.clone(),
            });
        }
    }
    Ok(())
}

//! Tracking across every `(condition, region, channel)` group.

use super::config::validate_max_distance;
use super::result::{GroupOutcome, GroupReport, Track, TrackId, TrackingResult};
use super::tracker::{track_frames, Frame};
use crate::errors::{ConfigError, TrackingError};
use crate::roi::{GroupKey, Region};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Partitions regions by group and tracks each group independently.
///
/// Groups are processed in key order and track ids are numbered across
/// groups, so every id in the result is unique. Within a group, regions
/// keep their input order per timepoint. A missing timepoint between two
/// observed ones breaks every track, as an empty frame would.
///
/// A group with a malformed region is reported as
/// [`GroupOutcome::Untracked`] and each of its regions gets a track of its
/// own; the other groups are unaffected.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidMaxDistance`] if `max_distance` is
/// negative or not finite.
pub fn track_groups(regions: &[Region], max_distance: f64) -> Result<TrackingResult, ConfigError> {
    validate_max_distance(max_distance)?;

    let mut groups: BTreeMap<GroupKey, Vec<&Region>> = BTreeMap::new();
    for region in regions {
        groups.entry(region.group_key()).or_default().push(region);
    }

    let mut result = TrackingResult::default();
    let mut next_id = 0;

    for (group, mut members) in groups {
        members.sort_by_key(|r| r.timepoint());
        let frames = frames_of(&members);

        let (tracks, outcome) = match track_frames(&frames, max_distance, next_id) {
            Ok(tracks) => (tracks, GroupOutcome::Tracked),
            Err(TrackingError::Data(error)) => {
                warn!(group = %group, error = %error, "Group left untracked");
                (one_track_per_region(&members, next_id), GroupOutcome::Untracked { error })
            }
            Err(TrackingError::Config(error)) => return Err(error),
        };

        debug!(group = %group, regions = members.len(), tracks = tracks.len(), "Tracked group");
        if let Some(last) = tracks.last() {
            next_id = last.id.0 + 1;
        }

        result.groups.push(GroupReport {
            group,
            outcome,
            region_count: members.len(),
            track_count: tracks.len(),
        });
        result.tracks.extend(tracks);
    }

    Ok(result)
}

/// Builds frames from regions sorted by timepoint, inserting one empty
/// frame wherever timepoints are not consecutive.
fn frames_of<'a>(sorted: &[&'a Region]) -> Vec<Frame<'a>> {
    let mut frames: Vec<Frame<'a>> = Vec::new();
    for region in sorted {
        let timepoint = region.timepoint();
        match frames.last().map(|f| f.timepoint) {
            Some(previous) if previous == timepoint => {
                if let Some(frame) = frames.last_mut() {
                    frame.regions.push(*region);
                }
            }
            Some(previous) if timepoint > previous + 1 => {
                frames.push(Frame::empty(previous + 1));
                frames.push(Frame::new(timepoint, [*region]));
            }
            _ => frames.push(Frame::new(timepoint, [*region])),
        }
    }
    frames
}

fn one_track_per_region(members: &[&Region], first_id: u32) -> Vec<Track> {
    members
        .iter()
        .zip(first_id..)
        .map(|(region, id)| Track::start(TrackId(id), region.timepoint(), region, None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DataError;
    use crate::roi::RegionCoordinates;
    use crate::testing::{degenerate_region_in, region_in};
    use pretty_assertions::assert_eq;

    fn key(region: &str) -> GroupKey {
        GroupKey::new("Dish_1", region, "ch00")
    }

    #[test]
    fn test_groups_are_tracked_independently() {
        let regions = vec![
            region_in(&key("R_2"), "b0", 0, 0.0, 0.0),
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            region_in(&key("R_1"), "a1", 1, 1.0, 0.0),
            region_in(&key("R_2"), "b1", 1, 1.0, 0.0),
        ];

        let result = track_groups(&regions, 5.0).unwrap();

        assert_eq!(result.groups.len(), 2);
        assert_eq!(result.groups[0].group, key("R_1"));
        assert_eq!(result.track_of(&key("R_1"), "a1"), Some(TrackId(0)));
        assert_eq!(result.track_of(&key("R_2"), "b1"), Some(TrackId(1)));
        assert!(result.groups.iter().all(GroupReport::is_tracked));
    }

    #[test]
    fn test_same_position_in_other_group_is_not_matched() {
        let regions = vec![
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            region_in(&GroupKey::new("Dish_1", "R_1", "ch01"), "a1", 1, 0.0, 0.0),
        ];
        let result = track_groups(&regions, 5.0).unwrap();
        assert_eq!(result.tracks.len(), 2);
    }

    #[test]
    fn test_malformed_group_is_isolated() {
        let regions = vec![
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            degenerate_region_in(&key("R_1"), "a1", 1),
            region_in(&key("R_2"), "b0", 0, 0.0, 0.0),
            region_in(&key("R_2"), "b1", 1, 2.0, 0.0),
        ];

        let result = track_groups(&regions, 5.0).unwrap();

        let bad = result.group(&key("R_1")).unwrap();
        assert_eq!(
            bad.outcome,
            GroupOutcome::Untracked {
                error: DataError::TooFewVertices {
                    region_id: "a1".to_string(),
                    count: 2
                }
            }
        );
        assert_eq!(bad.track_count, 2);
        assert_ne!(result.track_of(&key("R_1"), "a0"), result.track_of(&key("R_1"), "a1"));

        let good = result.group(&key("R_2")).unwrap();
        assert!(good.is_tracked());
        assert_eq!(result.track_of(&key("R_2"), "b0"), result.track_of(&key("R_2"), "b1"));

        let summary = result.summary();
        assert_eq!(summary.untracked_groups, 1);
        assert_eq!(summary.tracks, 3);
        assert_eq!(summary.regions, 4);
    }

    #[test]
    fn test_track_ids_are_unique_across_groups() {
        let regions: Vec<Region> = ["R_1", "R_2", "R_3"]
            .iter()
            .flat_map(|r| (0..3u32).map(move |k| region_in(&key(r), &format!("{r}_{k}"), 0, f64::from(k) * 50.0, 0.0)))
            .collect();

        let result = track_groups(&regions, 5.0).unwrap();
        let ids: Vec<u32> = result.tracks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn test_gap_in_timepoints_breaks_tracks() {
        let regions = vec![
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            region_in(&key("R_1"), "a2", 2, 0.0, 0.0),
        ];
        let result = track_groups(&regions, 5.0).unwrap();
        assert_eq!(result.tracks.len(), 2);
    }

    #[test]
    fn test_input_order_of_timepoints_does_not_matter() {
        let forward = vec![
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            region_in(&key("R_1"), "a1", 1, 1.0, 0.0),
        ];
        let backward: Vec<Region> = forward.iter().rev().cloned().collect();

        assert_eq!(
            track_groups(&forward, 5.0).unwrap(),
            track_groups(&backward, 5.0).unwrap()
        );
    }

    #[test]
    fn test_invalid_max_distance() {
        let regions = vec![Region::new("a", Vec::new(), RegionCoordinates::new("c", "r", "ch", 0))];
        assert_eq!(
            track_groups(&regions, f64::INFINITY),
            Err(ConfigError::InvalidMaxDistance(f64::INFINITY))
        );
    }

    #[test]
    fn test_summary_of_tracked_groups() {
        let regions = vec![
            region_in(&key("R_1"), "a0", 0, 0.0, 0.0),
            region_in(&key("R_1"), "a1", 1, 1.0, 0.0),
            region_in(&key("R_1"), "a2", 2, 2.0, 0.0),
            region_in(&key("R_1"), "n2", 2, 40.0, 0.0),
        ];
        let summary = track_groups(&regions, 5.0).unwrap().summary();

        assert_eq!(summary.groups, 1);
        assert_eq!(summary.tracks, 2);
        assert_eq!(summary.longest_track, 3);
        assert!((summary.mean_track_length - 2.0).abs() < f64::EPSILON);
    }
}

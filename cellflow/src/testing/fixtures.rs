//! Region and stage fixtures.

use crate::geometry::Point;
use crate::registry::StageId;
use crate::roi::{GroupKey, Region, RegionCoordinates};
use crate::stages::{NoOpStage, StageSet};

/// Condition used by [`region_at`].
pub const FIXTURE_CONDITION: &str = "Dish_1_Control";
/// Region-of-image used by [`region_at`].
pub const FIXTURE_REGION: &str = "R_1";
/// Channel used by [`region_at`].
pub const FIXTURE_CHANNEL: &str = "ch00";

/// The vertices of an axis-aligned square centred on `(x, y)`.
#[must_use]
pub fn square(x: f64, y: f64, half_side: f64) -> Vec<Point> {
    vec![
        Point::new(x - half_side, y - half_side),
        Point::new(x + half_side, y - half_side),
        Point::new(x + half_side, y + half_side),
        Point::new(x - half_side, y + half_side),
    ]
}

/// The fixture group.
#[must_use]
pub fn fixture_group() -> GroupKey {
    GroupKey::new(FIXTURE_CONDITION, FIXTURE_REGION, FIXTURE_CHANNEL)
}

/// A 2x2 square region centred on `(x, y)` in the fixture group.
#[must_use]
pub fn region_at(id: &str, timepoint: u32, x: f64, y: f64) -> Region {
    region_in(&fixture_group(), id, timepoint, x, y)
}

/// A 2x2 square region centred on `(x, y)` in the given group.
#[must_use]
pub fn region_in(group: &GroupKey, id: &str, timepoint: u32, x: f64, y: f64) -> Region {
    Region::new(id, square(x, y, 1.0), coordinates(group, timepoint))
}

/// A two-vertex region in the fixture group; its centroid is a data error.
#[must_use]
pub fn degenerate_region(id: &str, timepoint: u32) -> Region {
    degenerate_region_in(&fixture_group(), id, timepoint)
}

/// A two-vertex region in the given group.
#[must_use]
pub fn degenerate_region_in(group: &GroupKey, id: &str, timepoint: u32) -> Region {
    Region::new(
        id,
        vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        coordinates(group, timepoint),
    )
}

/// No-op implementations for every stage id.
#[must_use]
pub fn noop_stages() -> StageSet {
    StageId::ALL
        .into_iter()
        .fold(StageSet::new(), |set, id| set.with(NoOpStage::new(id)))
}

fn coordinates(group: &GroupKey, timepoint: u32) -> RegionCoordinates {
    RegionCoordinates::new(group.condition.clone(), group.region.clone(), group.channel.clone(), timepoint)
}

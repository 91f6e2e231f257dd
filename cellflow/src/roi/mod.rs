//! Regions of interest: per-cell polygons produced by segmentation.

mod source;

pub use source::{InMemoryRegionSource, RegionSource};

#[cfg(test)]
pub(crate) use source::MockRegionSource;

use crate::errors::DataError;
use crate::geometry::{polygon_centroid, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where an image (and so every region cut from it) belongs in the
/// experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCoordinates {
    /// Experimental condition, e.g. `Dish_1_Control`.
    pub condition: String,
    /// Imaged field, e.g. `R_1`.
    pub region: String,
    /// Channel, e.g. `ch00`.
    pub channel: String,
    /// Timepoint index.
    pub timepoint: u32,
}

impl RegionCoordinates {
    /// Creates coordinates.
    #[must_use]
    pub fn new(
        condition: impl Into<String>,
        region: impl Into<String>,
        channel: impl Into<String>,
        timepoint: u32,
    ) -> Self {
        Self {
            condition: condition.into(),
            region: region.into(),
            channel: channel.into(),
            timepoint,
        }
    }

    /// Returns the tracking group these coordinates belong to.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            condition: self.condition.clone(),
            region: self.region.clone(),
            channel: self.channel.clone(),
        }
    }
}

/// A `(condition, region, channel)` triple. Tracking never crosses groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Experimental condition.
    pub condition: String,
    /// Imaged field.
    pub region: String,
    /// Channel.
    pub channel: String,
}

impl GroupKey {
    /// Creates a group key.
    #[must_use]
    pub fn new(condition: impl Into<String>, region: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            region: region.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.condition, self.region, self.channel)
    }
}

/// One segmented cell outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Unique id within its group.
    pub id: String,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Polygon vertices in pixel coordinates.
    pub vertices: Vec<Point>,
    /// Path of the binary mask this region was cut from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<PathBuf>,
    /// Placement in the experiment.
    pub coordinates: RegionCoordinates,
}

impl Region {
    /// Creates a region.
    #[must_use]
    pub fn new(id: impl Into<String>, vertices: Vec<Point>, coordinates: RegionCoordinates) -> Self {
        Self {
            id: id.into(),
            label: None,
            vertices,
            mask: None,
            coordinates,
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the mask reference.
    #[must_use]
    pub fn with_mask(mut self, mask: impl Into<PathBuf>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Returns the timepoint.
    #[must_use]
    pub fn timepoint(&self) -> u32 {
        self.coordinates.timepoint
    }

    /// Returns the tracking group.
    #[must_use]
    pub fn group_key(&self) -> GroupKey {
        self.coordinates.group_key()
    }

    /// Computes the polygon centroid.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::TooFewVertices`] for fewer than three vertices,
    /// and [`DataError::NonFiniteCentroid`] if a coordinate is NaN or
    /// infinite.
    pub fn centroid(&self) -> Result<Point, DataError> {
        if self.vertices.len() < 3 {
            return Err(DataError::TooFewVertices {
                region_id: self.id.clone(),
                count: self.vertices.len(),
            });
        }

        polygon_centroid(&self.vertices)
            .filter(|c| c.is_finite())
            .ok_or_else(|| DataError::NonFiniteCentroid {
                region_id: self.id.clone(),
            })
    }
}

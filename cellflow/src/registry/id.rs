//! The closed set of stage identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a pipeline stage.
///
/// The set is closed: every stage the workflow knows about is a variant
/// here. The registry decides which of them are available and where they
/// sit in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Pick conditions, regions, channels and timepoints to analyse.
    DataSelection,
    /// Bin images and run the external segmentation program.
    Segmentation,
    /// Track, resize and duplicate ROIs, then extract single cells.
    ProcessSingleCell,
    /// Group cells by intensity and threshold each group.
    ThresholdGroupedCells,
    /// Measure the area of every ROI.
    MeasureRoiArea,
    /// Combine masks, analyse per-cell masks and aggregate results.
    Analysis,
    /// Remove intermediate files.
    Cleanup,
}

impl StageId {
    /// Every stage id, in canonical order.
    pub const ALL: [Self; 7] = [
        Self::DataSelection,
        Self::Segmentation,
        Self::ProcessSingleCell,
        Self::ThresholdGroupedCells,
        Self::MeasureRoiArea,
        Self::Analysis,
        Self::Cleanup,
    ];

    /// Returns the snake_case name used in configuration and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataSelection => "data_selection",
            Self::Segmentation => "segmentation",
            Self::ProcessSingleCell => "process_single_cell",
            Self::ThresholdGroupedCells => "threshold_grouped_cells",
            Self::MeasureRoiArea => "measure_roi_area",
            Self::Analysis => "analysis",
            Self::Cleanup => "cleanup",
        }
    }

    /// Looks up an id by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::from_name(&normalized).ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

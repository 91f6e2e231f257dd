//! Stage artifacts and the read-only artifact set threaded through a run.

use crate::registry::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An artifact produced by a stage.
///
/// Artifacts are addressed by name. The data is opaque to the executor;
/// stages agree among themselves on what a given name contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageArtifact {
    /// Unique name within a run (e.g., "tracking_result").
    pub name: String,

    /// What kind of thing this is (e.g., "report", "file", "tracks").
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// The artifact content.
    pub data: serde_json::Value,

    /// The stage that produced it. Filled in by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<StageId>,

    /// When the artifact was created (ISO 8601).
    pub created_at: String,
}

impl StageArtifact {
    /// Creates a new stage artifact.
    #[must_use]
    pub fn new(name: impl Into<String>, artifact_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            artifact_type: artifact_type.into(),
            data,
            produced_by: None,
            created_at: crate::utils::iso_timestamp(),
        }
    }

    /// Creates an artifact by serializing a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn from_serializable<T: Serialize>(
        name: impl Into<String>,
        artifact_type: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(name, artifact_type, serde_json::to_value(value)?))
    }

    /// Deserializes the artifact data into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the data does not match `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Read-only set of artifacts accumulated by completed stages.
///
/// The executor builds a new set each time a stage completes, so a stage
/// only ever sees artifacts of stages that finished before it started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet {
    items: BTreeMap<String, StageArtifact>,
}

impl ArtifactSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from artifacts supplied by the caller (e.g., a resumed run).
    ///
    /// Later entries with the same name replace earlier ones.
    #[must_use]
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = StageArtifact>) -> Self {
        let items = artifacts.into_iter().map(|a| (a.name.clone(), a)).collect();
        Self { items }
    }

    /// Gets an artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageArtifact> {
        self.items.get(name)
    }

    /// Checks if a name is taken.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Returns the number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns all names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.items.keys().map(String::as_str).collect()
    }

    /// Iterates over the artifacts in name order.
    pub fn iter(&self) -> impl Iterator<Item = &StageArtifact> {
        self.items.values()
    }

    /// Returns the first name in `artifacts` that is already taken, if any.
    #[must_use]
    pub fn first_conflict<'a>(&self, artifacts: &'a [StageArtifact]) -> Option<&'a str> {
        let mut seen = std::collections::HashSet::new();
        artifacts
            .iter()
            .map(|a| a.name.as_str())
            .find(|name| self.contains(name) || !seen.insert(*name))
    }

    /// Returns a new set with `artifacts` added, each tagged with `stage`.
    ///
    /// Callers check [`first_conflict`](Self::first_conflict) first; a
    /// conflicting name here replaces the older entry.
    #[must_use]
    pub fn merged(&self, stage: StageId, artifacts: Vec<StageArtifact>) -> Self {
        if artifacts.is_empty() {
            return self.clone();
        }
        let mut items = self.items.clone();
        for mut artifact in artifacts {
            artifact.produced_by = Some(stage);
            items.insert(artifact.name.clone(), artifact);
        }
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_creation() {
        let artifact = StageArtifact::new("masks", "file", serde_json::json!({"path": "masks/"}));

        assert_eq!(artifact.name, "masks");
        assert_eq!(artifact.artifact_type, "file");
        assert!(artifact.produced_by.is_none());
    }

    #[test]
    fn test_artifact_decode() {
        let artifact = StageArtifact::from_serializable("counts", "report", &vec![1, 2, 3]).unwrap();
        let counts: Vec<u32> = artifact.decode().unwrap();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[test]
    fn test_merged_is_a_new_set() {
        let empty = ArtifactSet::new();
        let merged = empty.merged(
            StageId::Segmentation,
            vec![StageArtifact::new("masks", "file", serde_json::json!(null))],
        );

        assert!(empty.is_empty());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("masks").unwrap().produced_by, Some(StageId::Segmentation));
    }

    #[test]
    fn test_first_conflict() {
        let set = ArtifactSet::from_artifacts(vec![StageArtifact::new("a", "x", serde_json::json!(1))]);

        let incoming = vec![
            StageArtifact::new("b", "x", serde_json::json!(2)),
            StageArtifact::new("a", "x", serde_json::json!(3)),
        ];
        assert_eq!(set.first_conflict(&incoming), Some("a"));

        let duplicated = vec![
            StageArtifact::new("c", "x", serde_json::json!(2)),
            StageArtifact::new("c", "x", serde_json::json!(3)),
        ];
        assert_eq!(set.first_conflict(&duplicated), Some("c"));

        assert_eq!(set.first_conflict(&[]), None);
    }

    #[test]
    fn test_artifact_set_serialization() {
        let set = ArtifactSet::from_artifacts(vec![StageArtifact::new("a", "x", serde_json::json!(1))]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("a").is_some());

        let back: ArtifactSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}

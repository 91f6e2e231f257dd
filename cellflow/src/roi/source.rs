//! Where regions come from.

use super::Region;
use async_trait::async_trait;

/// Loads the regions of a run.
///
/// Implementations read ROI archives or segmentation output; parsing those
/// formats lives outside this crate. Errors are reported with `anyhow`
/// because every backend fails differently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegionSource: Send + Sync {
    /// Returns every region to track, in any order.
    async fn load_regions(&self) -> anyhow::Result<Vec<Region>>;
}

/// A source backed by a vector, for tests and callers that already hold
/// the regions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegionSource {
    regions: Vec<Region>,
}

impl InMemoryRegionSource {
    /// Creates a source that yields the given regions.
    #[must_use]
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }
}

#[async_trait]
impl RegionSource for InMemoryRegionSource {
    async fn load_regions(&self) -> anyhow::Result<Vec<Region>> {
        Ok(self.regions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::RegionCoordinates;

    #[tokio::test]
    async fn test_in_memory_source() {
        let region = Region::new("A", Vec::new(), RegionCoordinates::new("c", "r", "ch00", 0));
        let source = InMemoryRegionSource::new(vec![region.clone()]);
        assert_eq!(source.load_regions().await.unwrap(), vec![region]);
    }

    #[tokio::test]
    async fn test_mock_source() {
        let mut source = MockRegionSource::new();
        source
            .expect_load_regions()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("archive missing")));

        let err = source.load_regions().await.unwrap_err();
        assert!(err.to_string().contains("archive missing"));
    }
}

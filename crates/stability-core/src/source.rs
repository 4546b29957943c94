//! Image source collaborator: supplies the yearly layers, mask and region.

use crate::error::Result;
use crate::grid::MaskRaster;
use crate::observations::YearlyObservationSet;
use crate::region::RegionGeometry;

pub trait ImageSource {
    /// The four co-registered yearly classifications.
    fn observations(&self) -> Result<YearlyObservationSet>;

    /// Optional sub-region mask (e.g. riparian zones).
    fn mask(&self) -> Result<Option<MaskRaster>>;

    /// Region of interest.
    fn region(&self) -> Result<RegionGeometry>;
}

/// Source backed by values already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    pub observations: YearlyObservationSet,
    pub mask: Option<MaskRaster>,
    pub region: RegionGeometry,
}

impl ImageSource for MemorySource {
    fn observations(&self) -> Result<YearlyObservationSet> {
        Ok(self.observations.clone())
    }

    fn mask(&self) -> Result<Option<MaskRaster>> {
        Ok(self.mask.clone())
    }

    fn region(&self) -> Result<RegionGeometry> {
        Ok(self.region.clone())
    }
}

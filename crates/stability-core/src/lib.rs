//! Multi-year land-cover stability classification and zonal class areas.
//!
//! Four yearly classifications (non-vegetated / senesced / evergreen) are
//! reclassified per pixel into seven stability classes, clipped to a region
//! of interest and reduced to the area occupied by each class, optionally
//! inside a mask.

pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod landcover;
pub mod observations;
mod par;
pub mod pipeline;
pub mod reclassify;
pub mod region;
pub mod source;
pub mod vis;
pub mod zonal;

pub use config::StabilityConfig;
pub use error::{Error, Result};
pub use export::{ExportRequest, ExportSink, JsonDirSink};
pub use grid::{AreaRaster, CategoricalRaster, GridSpec, GridUnits, MaskRaster};
pub use landcover::{LandCover, StabilityClass};
pub use observations::{YearlyObservationSet, N_YEARS};
pub use pipeline::{StabilityPipeline, StabilityReport, StabilityRun};
pub use reclassify::{classify, decide, reclassify, DomainViolations, Reclassification, OUTPUT_NODATA};
pub use region::{RegionDef, RegionGeometry};
pub use source::{ImageSource, MemorySource};
pub use vis::{render_rgba, VisParams};
pub use zonal::{zonal_areas, AggregationOptions, AreaTable};

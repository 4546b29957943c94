//! Pipeline orchestrator: runs all stability stages in order.

use serde::Serialize;
use tracing::info;

use crate::config::StabilityConfig;
use crate::error::Result;
use crate::export::ExportSink;
use crate::grid::{CategoricalRaster, GridSpec};
use crate::observations::N_YEARS;
use crate::reclassify::{reclassify, DomainViolations};
use crate::region::RegionGeometry;
use crate::source::ImageSource;
use crate::zonal::{zonal_areas, AreaTable};

// ── Public structs ────────────────────────────────────────────────────────────

/// Serializable summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct StabilityReport {
    pub years: [u16; N_YEARS],
    pub grid: GridSpec,
    pub violations: DomainViolations,
    /// Area per stability class over the whole region.
    pub region_areas: AreaTable,
    /// Area per stability class inside the mask, when one was supplied.
    pub masked_areas: Option<AreaTable>,
}

/// Full output of the pipeline.
pub struct StabilityRun {
    /// Stability classes clipped to the region (outside = nodata).
    pub classes: CategoricalRaster,
    pub region: RegionGeometry,
    pub report: StabilityReport,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct StabilityPipeline {
    config: StabilityConfig,
}

impl StabilityPipeline {
    pub fn new(config: StabilityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Run the pipeline against `source`.
    ///
    /// Order:
    ///   1. Load yearly layers, mask and region
    ///   2. Reclassify
    ///   3. Clip to region
    ///   4. Area per class over the region
    ///   5. Area per class inside the mask
    pub fn run(&self, source: &dyn ImageSource) -> Result<StabilityRun> {
        // ── 1. Inputs ───────────────────────────────────────────────────────
        let observations = source.observations()?;
        let mask = source.mask()?;
        let region = source.region()?;
        let grid = *observations.grid();
        info!(
            years = ?observations.years(),
            %grid,
            mask_pixels = mask.as_ref().map(|m| m.included_count()),
            "loaded inputs"
        );

        // ── 2. Reclassification ─────────────────────────────────────────────
        let reclassified = reclassify(&observations);

        // ── 3. Clip ─────────────────────────────────────────────────────────
        let classes = region.clip(&reclassified.raster);

        // ── 4. Region areas ─────────────────────────────────────────────────
        let areas = grid.pixel_areas();
        let options = self.config.aggregation();
        let region_areas = zonal_areas(&classes, None, &region, &areas, &options)?;
        log_table("region", &region_areas);

        // ── 5. Masked areas ─────────────────────────────────────────────────
        let masked_areas = match &mask {
            Some(m) => {
                let table = zonal_areas(&classes, Some(m), &region, &areas, &options)?;
                log_table("masked", &table);
                Some(table)
            }
            None => None,
        };

        Ok(StabilityRun {
            classes,
            region,
            report: StabilityReport {
                years: observations.years(),
                grid,
                violations: reclassified.violations,
                region_areas,
                masked_areas,
            },
        })
    }

    /// Hand the clipped class raster to `sink` under the configured limits.
    pub fn export(&self, run: &StabilityRun, sink: &mut dyn ExportSink) -> Result<()> {
        let request = self.config.export_request(&run.region);
        sink.export(&run.classes, &request)
    }
}

fn log_table(scope: &str, table: &AreaTable) {
    if table.is_empty() {
        info!(scope, "no classified pixels in scope");
        return;
    }
    for (class, entry) in table.iter() {
        info!(scope, class = %class, area_m2 = entry.area, pixels = entry.pixels, "area per stability class");
    }
    info!(scope, total_m2 = table.total_area(), "total classified area");
}

// ── Unit tests ────────────────────────────────────────────────────────────────

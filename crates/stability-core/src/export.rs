//! Export sink collaborator: persists a class raster with its metadata.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::grid::{CategoricalRaster, GridSpec};
use crate::region::RegionDef;

/// What to export and under which limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Base name of the exported artefacts.
    pub description: String,
    /// Nominal ground resolution in metres, recorded with the export.
    pub scale: f64,
    /// Exports larger than this are refused.
    pub max_pixels: u64,
    pub region: RegionDef,
}

impl ExportRequest {
    /// Validate the request against the raster about to be written.
    pub fn check(&self, raster: &CategoricalRaster) -> Result<()> {
        let valid_name = !self.description.is_empty()
            && self
                .description
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid_name {
            return Err(Error::InvalidParameter {
                name: "description",
                value: self.description.clone(),
                reason: "use ASCII letters, digits, '_', '-' or '.'".into(),
            });
        }
        if !(self.scale > 0.0) {
            return Err(Error::InvalidParameter {
                name: "scale",
                value: self.scale.to_string(),
                reason: "must be positive".into(),
            });
        }
        let pixels = raster.grid.len() as u64;
        if pixels > self.max_pixels {
            return Err(Error::ExportTooLarge {
                description: self.description.clone(),
                pixels,
                max_pixels: self.max_pixels,
            });
        }
        Ok(())
    }

    /// Metadata stored alongside (or together with) the exported raster.
    pub fn sidecar(&self, raster: &CategoricalRaster) -> ExportSidecar {
        ExportSidecar {
            description: self.description.clone(),
            scale: self.scale,
            grid: raster.grid,
            nodata: raster.nodata,
            region: self.region.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSidecar {
    pub description: String,
    pub scale: f64,
    pub grid: GridSpec,
    pub nodata: Option<u8>,
    pub region: RegionDef,
}

/// Destination for exported rasters.
pub trait ExportSink {
    fn export(&mut self, raster: &CategoricalRaster, request: &ExportRequest) -> Result<()>;
}

/// Document written by [`JsonDirSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedRaster {
    pub metadata: ExportSidecar,
    pub raster: CategoricalRaster,
}

/// Writes `<dir>/<description>.json` holding the raster and its metadata.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, description: &str) -> PathBuf {
        self.dir.join(format!("{description}.json"))
    }

    pub fn read(path: &Path) -> Result<ExportedRaster> {
        let text = fs::read_to_string(path)?;
        let doc: ExportedRaster = serde_json::from_str(&text)?;
        doc.raster.validate()?;
        Ok(doc)
    }
}

impl ExportSink for JsonDirSink {
    fn export(&mut self, raster: &CategoricalRaster, request: &ExportRequest) -> Result<()> {
        request.check(raster)?;
        fs::create_dir_all(&self.dir)?;
        let doc = ExportedRaster {
            metadata: request.sidecar(raster),
            raster: raster.clone(),
        };
        let path = self.path_for(&request.description);
        fs::write(&path, serde_json::to_string(&doc)?)?;
        info!(path = %path.display(), pixels = raster.grid.len(), "exported class raster");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionGeometry;

    fn request(max_pixels: u64) -> ExportRequest {
        ExportRequest {
            description: "StabilityClass_ROI".into(),
            scale: 10.0,
            max_pixels,
            region: RegionGeometry::rect(0.0, 0.0, 1.0, 1.0).unwrap().to_def(),
        }
    }

    #[test]
    fn json_sink_writes_readable_document() {
        let dir = tempfile::tempdir().unwrap();
        let grid = GridSpec::new(3, 2, 0.0, 1.0, 0.0, 1.0);
        let raster = CategoricalRaster::from_vec(grid, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let mut sink = JsonDirSink::new(dir.path().join("out"));
        sink.export(&raster, &request(1_000_000_000)).unwrap();

        let doc = JsonDirSink::read(&sink.path_for("StabilityClass_ROI")).unwrap();
        assert_eq!(doc.raster, raster);
        assert_eq!(doc.metadata.scale, 10.0);
        assert_eq!(doc.metadata.grid, grid);
    }

    #[test]
    fn refuses_exports_over_max_pixels() {
        let grid = GridSpec::new(4, 4, 0.0, 1.0, 0.0, 1.0);
        let raster = CategoricalRaster::filled(grid, 1);
        let err = request(15).check(&raster).unwrap_err();
        assert!(matches!(err, Error::ExportTooLarge { pixels: 16, max_pixels: 15, .. }));
        assert!(request(16).check(&raster).is_ok());
    }

    #[test]
    fn refuses_unsafe_descriptions() {
        let grid = GridSpec::new(1, 1, 0.0, 1.0, 0.0, 1.0);
        let raster = CategoricalRaster::filled(grid, 1);
        let mut req = request(10);
        req.description = "../escape".into();
        assert!(req.check(&raster).is_err());
    }
}

//! Plain TIFF export: `<description>.tif` plus a JSON sidecar with
//! grid, nodata and region.

use std::fs;
use std::path::{Path, PathBuf};

use stability_core::export::ExportSidecar;
use stability_core::{CategoricalRaster, ExportRequest, ExportSink, Result};
use tracing::info;

use crate::tiff_io;

#[derive(Debug, Clone)]
pub struct TiffSink {
    dir: PathBuf,
}

impl TiffSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn raster_path(&self, description: &str) -> PathBuf {
        self.dir.join(format!("{description}.tif"))
    }

    pub fn sidecar_path(&self, description: &str) -> PathBuf {
        self.dir.join(format!("{description}.json"))
    }

    /// Read an export back using its sidecar for georeferencing.
    pub fn read(raster_path: &Path, sidecar_path: &Path) -> Result<(ExportSidecar, CategoricalRaster)> {
        let sidecar: ExportSidecar = serde_json::from_str(&fs::read_to_string(sidecar_path)?)?;
        let data = tiff_io::read_u8(raster_path, &sidecar.grid)?;
        let raster = CategoricalRaster::from_vec(sidecar.grid, data)?.with_nodata(sidecar.nodata);
        Ok((sidecar, raster))
    }
}

impl ExportSink for TiffSink {
    fn export(&mut self, raster: &CategoricalRaster, request: &ExportRequest) -> Result<()> {
        request.check(raster)?;
        fs::create_dir_all(&self.dir)?;
        let raster_path = self.raster_path(&request.description);
        tiff_io::write_u8(&raster_path, raster)?;
        let sidecar_path = self.sidecar_path(&request.description);
        fs::write(&sidecar_path, serde_json::to_string_pretty(&request.sidecar(raster))?)?;
        info!(
            path = %raster_path.display(),
            sidecar = %sidecar_path.display(),
            pixels = raster.grid.len(),
            "exported class raster"
        );
        Ok(())
    }
}

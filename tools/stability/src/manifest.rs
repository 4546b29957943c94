//! JSON manifest naming the yearly classifications, mask and region.
//!
//! ```json
//! {
//!   "grid":   { "width": 512, "height": 512, "min_x": -117.6, "max_x": -117.2,
//!               "min_y": 46.3, "max_y": 46.7 },
//!   "years":  [ { "year": 2016, "path": "class16.tif" }, ... ],
//!   "mask":   { "path": "riparian.tif" },
//!   "region": { "polygons": [ { "exterior": [[-117.5, 46.4], ...] } ] },
//!   "config": { "scale": 10.0, "best_effort": true }
//! }
//! ```
//!
//! Paths are relative to the manifest. `.json` layers carry their own grid;
//! `.tif`/`.tiff` layers take `grid` from the manifest.

use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use stability_core::{
    CategoricalRaster, Error, GridSpec, ImageSource, MaskRaster, RegionDef, RegionGeometry,
    StabilityConfig, YearlyObservationSet, N_YEARS,
};

use crate::tiff_io;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub grid: Option<GridSpec>,
    pub years: Vec<LayerDef>,
    #[serde(default)]
    pub mask: Option<MaskDef>,
    #[serde(default)]
    pub region: Option<RegionDef>,
    #[serde(default)]
    pub config: StabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerDef {
    pub year: u16,
    pub path: PathBuf,
    /// Overrides the layer's nodata code.
    #[serde(default)]
    pub nodata: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaskDef {
    pub path: PathBuf,
}

/// [`ImageSource`] reading the files named by a manifest.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    manifest: Manifest,
    base_dir: PathBuf,
    /// Grid of the loaded yearly layers, when the manifest has none.
    layer_grid: OnceCell<GridSpec>,
}

impl ManifestSource {
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
        if manifest.years.len() != N_YEARS {
            anyhow::bail!(
                "manifest lists {} yearly layers, exactly {N_YEARS} are required",
                manifest.years.len()
            );
        }
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            manifest,
            base_dir,
            layer_grid: OnceCell::new(),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    fn manifest_grid(&self, path: &Path) -> stability_core::Result<GridSpec> {
        let grid = self.manifest.grid.ok_or_else(|| Error::InvalidParameter {
            name: "grid",
            value: path.display().to_string(),
            reason: "TIFF layers need a manifest grid".into(),
        })?;
        grid.validate()?;
        Ok(grid)
    }

    /// Load one categorical layer by extension.
    pub fn load_layer(&self, layer: &LayerDef) -> stability_core::Result<CategoricalRaster> {
        let path = self.resolve(&layer.path);
        let raster = if is_tiff(&path) {
            let grid = self.manifest_grid(&path)?;
            CategoricalRaster::from_vec(grid, tiff_io::read_u8(&path, &grid)?)?
        } else {
            let raster: CategoricalRaster = serde_json::from_str(&fs::read_to_string(&path)?)?;
            raster.validate()?;
            raster
        };
        Ok(match layer.nodata {
            Some(code) => raster.with_nodata(Some(code)),
            None => raster,
        })
    }
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

impl ImageSource for ManifestSource {
    fn observations(&self) -> stability_core::Result<YearlyObservationSet> {
        let mut layers = Vec::with_capacity(N_YEARS);
        for layer in &self.manifest.years {
            layers.push((layer.year, self.load_layer(layer)?));
        }
        let layers: [(u16, CategoricalRaster); N_YEARS] =
            layers.try_into().map_err(|v: Vec<_>| Error::InvalidParameter {
                name: "years",
                value: v.len().to_string(),
                reason: format!("exactly {N_YEARS} yearly layers are required"),
            })?;
        let observations = YearlyObservationSet::new(layers)?;
        let _ = self.layer_grid.set(*observations.grid());
        Ok(observations)
    }

    fn mask(&self) -> stability_core::Result<Option<MaskRaster>> {
        let Some(def) = &self.manifest.mask else {
            return Ok(None);
        };
        let path = self.resolve(&def.path);
        let mask = if is_tiff(&path) {
            let grid = self.manifest_grid(&path)?;
            MaskRaster::from_vec(grid, tiff_io::read_u8(&path, &grid)?)?
        } else {
            let mask: MaskRaster = serde_json::from_str(&fs::read_to_string(&path)?)?;
            mask.validate()?;
            mask
        };
        Ok(Some(mask))
    }

    fn region(&self) -> stability_core::Result<RegionGeometry> {
        match &self.manifest.region {
            Some(def) => RegionGeometry::from_def(def),
            None => {
                // Whole extent of the yearly layers.
                let grid = match (self.manifest.grid, self.layer_grid.get()) {
                    (Some(g), _) | (None, Some(&g)) => g,
                    (None, None) => self.load_layer(&self.manifest.years[0])?.grid,
                };
                RegionGeometry::covering(&grid)
            }
        }
    }
}

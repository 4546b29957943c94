//! Region of interest: polygon set used to clip rasters and scope reductions.
//!
//! A pixel belongs to the region when its center lies strictly inside the
//! geometry. Coordinates are in the grid's units (lon/lat or metres).

use std::ops::Range;

use geo::{BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{CategoricalRaster, GridSpec};
use crate::par::*;
use crate::reclassify::OUTPUT_NODATA;

/// Serializable polygon: exterior ring plus optional holes, `[x, y]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonDef {
    pub exterior: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<[f64; 2]>>,
}

/// Serializable region: one or more polygons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDef {
    pub polygons: Vec<PolygonDef>,
}

#[derive(Debug, Clone)]
pub struct RegionGeometry {
    shape: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

fn ring(points: &[[f64; 2]]) -> Result<LineString<f64>> {
    if points.len() < 3 {
        return Err(Error::InvalidGeometry(format!(
            "ring needs at least 3 vertices, got {}",
            points.len()
        )));
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(Error::InvalidGeometry("non-finite vertex".into()));
    }
    // LineString is closed by Polygon::new when needed.
    Ok(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

fn ring_def(ls: &LineString<f64>) -> Vec<[f64; 2]> {
    ls.coords().map(|c| [c.x, c.y]).collect()
}

impl RegionGeometry {
    pub fn new(shape: MultiPolygon<f64>) -> Result<Self> {
        let bbox = shape
            .bounding_rect()
            .ok_or_else(|| Error::InvalidGeometry("region has no polygons".into()))?;
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(Error::InvalidGeometry("region has zero area".into()));
        }
        Ok(Self { shape, bbox })
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> Result<Self> {
        Self::new(MultiPolygon::new(vec![polygon]))
    }

    /// Axis-aligned rectangle region.
    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        Self::from_polygon(Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y }).to_polygon())
    }

    /// Region equal to the full extent of `grid`.
    pub fn covering(grid: &GridSpec) -> Result<Self> {
        Self::rect(grid.min_x, grid.min_y, grid.max_x, grid.max_y)
    }

    pub fn from_def(def: &RegionDef) -> Result<Self> {
        let polygons = def
            .polygons
            .iter()
            .map(|p| {
                let holes = p.holes.iter().map(|h| ring(h)).collect::<Result<Vec<_>>>()?;
                Ok(Polygon::new(ring(&p.exterior)?, holes))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(MultiPolygon::new(polygons))
    }

    pub fn to_def(&self) -> RegionDef {
        RegionDef {
            polygons: self
                .shape
                .iter()
                .map(|p| PolygonDef {
                    exterior: ring_def(p.exterior()),
                    holes: p.interiors().iter().map(ring_def).collect(),
                })
                .collect(),
        }
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }

    #[inline]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.shape.contains(&Point::new(x, y))
    }

    /// Pixels of `grid` whose centers fall inside the region's bounding box,
    /// or `None` when the region does not overlap the grid at all.
    pub fn pixel_window(&self, grid: &GridSpec) -> Option<PixelWindow> {
        let pw = grid.pixel_width();
        let ph = grid.pixel_height();
        let cols = center_range(self.bbox.min().x, self.bbox.max().x, grid.min_x, pw, grid.width)?;
        let rows = center_range(self.bbox.min().y, self.bbox.max().y, grid.min_y, ph, grid.height)?;
        Some(PixelWindow { rows, cols })
    }

    /// Evaluate the region over `window`, testing one point per
    /// `block × block` group of pixels. `block = 1` is the exact per-pixel test.
    pub fn cover(&self, grid: &GridSpec, window: &PixelWindow, block: usize) -> RegionCover {
        let block = block.max(1);
        let n_block_rows = window.rows.len().div_ceil(block);
        let n_block_cols = window.cols.len().div_ceil(block);
        let pw = grid.pixel_width();
        let ph = grid.pixel_height();

        let flags: Vec<Vec<bool>> = (0..n_block_rows)
            .into_par_iter()
            .map(|br| {
                let r0 = window.rows.start + br * block;
                let r1 = (r0 + block).min(window.rows.end);
                let y = grid.min_y + (r0 + r1) as f64 / 2.0 * ph;
                (0..n_block_cols)
                    .map(|bc| {
                        let c0 = window.cols.start + bc * block;
                        let c1 = (c0 + block).min(window.cols.end);
                        let x = grid.min_x + (c0 + c1) as f64 / 2.0 * pw;
                        self.contains_point(x, y)
                    })
                    .collect()
            })
            .collect();

        RegionCover {
            window: window.clone(),
            block,
            n_block_cols,
            flags: flags.concat(),
        }
    }

    /// Copy of `raster` with every pixel outside the region set to nodata.
    /// The input is left untouched.
    pub fn clip(&self, raster: &CategoricalRaster) -> CategoricalRaster {
        let grid = raster.grid;
        let nodata = raster.nodata.unwrap_or(OUTPUT_NODATA);
        let mut out = CategoricalRaster::filled(grid, nodata).with_nodata(Some(nodata));

        if let Some(window) = self.pixel_window(&grid) {
            let cover = self.cover(&grid, &window, 1);
            for row in window.rows.clone() {
                for col in window.cols.clone() {
                    if cover.contains(row, col) {
                        out.set(row, col, raster.get(row, col));
                    }
                }
            }
        }
        out
    }
}

/// Indices `i` in `0..n` whose centers `origin + (i + 0.5)·step` lie in `[lo, hi]`.
fn center_range(lo: f64, hi: f64, origin: f64, step: f64, n: usize) -> Option<Range<usize>> {
    let start = ((lo - origin) / step - 0.5).ceil().max(0.0);
    let end = (((hi - origin) / step - 0.5).floor() + 1.0).min(n as f64);
    if !(end > start) {
        return None;
    }
    Some(start as usize..end as usize)
}

/// Rectangular block of grid pixels (row and column ranges).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelWindow {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl PixelWindow {
    pub fn len(&self) -> usize {
        self.rows.len() * self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Region membership for every pixel of a window.
#[derive(Debug, Clone)]
pub struct RegionCover {
    pub window: PixelWindow,
    /// Side length of the pixel blocks that share one membership test.
    pub block: usize,
    n_block_cols: usize,
    flags: Vec<bool>,
}

impl RegionCover {
    /// Membership of grid pixel `(row, col)`; false outside the window.
    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        if !self.window.rows.contains(&row) || !self.window.cols.contains(&col) {
            return false;
        }
        let br = (row - self.window.rows.start) / self.block;
        let bc = (col - self.window.cols.start) / self.block;
        self.flags[br * self.n_block_cols + bc]
    }

    /// Number of membership tests the cover performed.
    pub fn tested_points(&self) -> usize {
        self.flags.len()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Authalic Earth radius in metres (sphere with the WGS84 ellipsoid's area).
pub const EARTH_RADIUS_M: f64 = 6_371_007.2;

/// Bounds may differ by at most this fraction of a pixel between aligned grids.
const ALIGN_TOLERANCE: f64 = 1e-6;

/// Units of the grid's coordinate bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridUnits {
    /// Geographic lon/lat in degrees.
    #[default]
    Degrees,
    /// Projected coordinates in metres.
    Metres,
}

/// Shape and georeferencing shared by every raster of one computation.
///
/// Row-major, row 0 = `min_y` (south edge), column 0 = `min_x` (west edge).
/// Coordinate math uses f64.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    #[serde(default)]
    pub units: GridUnits,
}

impl GridSpec {
    /// Create a geographic (degree) grid.
    pub fn new(width: usize, height: usize, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            width,
            height,
            min_x,
            max_x,
            min_y,
            max_y,
            units: GridUnits::Degrees,
        }
    }

    /// Create a projected grid in metres.
    pub fn metres(width: usize, height: usize, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            units: GridUnits::Metres,
            ..Self::new(width, height, min_x, max_x, min_y, max_y)
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn pixel_width(&self) -> f64 {
        (self.max_x - self.min_x) / self.width as f64
    }

    #[inline]
    pub fn pixel_height(&self) -> f64 {
        (self.max_y - self.min_y) / self.height as f64
    }

    /// Coordinates of the center of pixel `(row, col)`.
    #[inline]
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.min_x + (col as f64 + 0.5) * self.pixel_width(),
            self.min_y + (row as f64 + 0.5) * self.pixel_height(),
        )
    }

    /// Reject empty, inverted or non-finite grids.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParameter {
                name: "grid",
                value: self.to_string(),
                reason: "width and height must be positive".into(),
            });
        }
        let finite = [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.max_x <= self.min_x || self.max_y <= self.min_y {
            return Err(Error::InvalidParameter {
                name: "grid",
                value: self.to_string(),
                reason: "bounds must be finite with max > min".into(),
            });
        }
        if self.units == GridUnits::Degrees && (self.min_y < -90.0 || self.max_y > 90.0) {
            return Err(Error::InvalidParameter {
                name: "grid",
                value: self.to_string(),
                reason: "latitude bounds must lie within [-90, 90]".into(),
            });
        }
        Ok(())
    }

    /// True when both grids have the same shape, units and bounds
    /// (within a millionth of a pixel). No resampling is ever implied.
    pub fn is_aligned_with(&self, other: &GridSpec) -> bool {
        if self.width != other.width || self.height != other.height || self.units != other.units {
            return false;
        }
        let tol_x = self.pixel_width().abs() * ALIGN_TOLERANCE;
        let tol_y = self.pixel_height().abs() * ALIGN_TOLERANCE;
        (self.min_x - other.min_x).abs() <= tol_x
            && (self.max_x - other.max_x).abs() <= tol_x
            && (self.min_y - other.min_y).abs() <= tol_y
            && (self.max_y - other.max_y).abs() <= tol_y
    }

    /// Fail with `InputAlignment` unless `other` is aligned with `self`.
    pub fn ensure_aligned(&self, what: &str, other: &GridSpec) -> Result<()> {
        if self.is_aligned_with(other) {
            Ok(())
        } else {
            Err(Error::InputAlignment {
                what: what.to_string(),
                expected: *self,
                found: *other,
            })
        }
    }

    /// Area in m² of one pixel in `row`.
    ///
    /// Degree grids use the spherical cell area
    ///   R² · Δλ · |sin φ_top − sin φ_bottom|
    /// so area shrinks towards the poles; metre grids use |dx · dy|.
    pub fn row_pixel_area(&self, row: usize) -> f64 {
        match self.units {
            GridUnits::Metres => (self.pixel_width() * self.pixel_height()).abs(),
            GridUnits::Degrees => {
                let dy = self.pixel_height();
                let lat_bottom = (self.min_y + row as f64 * dy).clamp(-90.0, 90.0);
                let lat_top = (self.min_y + (row + 1) as f64 * dy).clamp(-90.0, 90.0);
                let d_lon = self.pixel_width().to_radians();
                EARTH_RADIUS_M
                    * EARTH_RADIUS_M
                    * d_lon.abs()
                    * (lat_top.to_radians().sin() - lat_bottom.to_radians().sin()).abs()
            }
        }
    }

    /// Per-pixel area raster for this grid.
    pub fn pixel_areas(&self) -> AreaRaster {
        let mut data = Vec::with_capacity(self.len());
        for row in 0..self.height {
            let a = self.row_pixel_area(row);
            data.extend(std::iter::repeat(a).take(self.width));
        }
        AreaRaster { data, grid: *self }
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} [{}, {}]x[{}, {}] {:?}",
            self.width, self.height, self.min_x, self.max_x, self.min_y, self.max_y, self.units
        )
    }
}

fn check_len(grid: &GridSpec, len: usize) -> Result<()> {
    if len != grid.len() {
        return Err(Error::InvalidDimensions {
            width: grid.width,
            height: grid.height,
            len,
        });
    }
    Ok(())
}

// ── Categorical raster ────────────────────────────────────────────────────────

/// A grid of `u8` category codes with an optional nodata code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalRaster {
    /// Row-major category codes.
    pub data: Vec<u8>,
    pub grid: GridSpec,
    #[serde(default)]
    pub nodata: Option<u8>,
}

impl CategoricalRaster {
    pub fn from_vec(grid: GridSpec, data: Vec<u8>) -> Result<Self> {
        check_len(&grid, data.len())?;
        Ok(Self { data, grid, nodata: None })
    }

    pub fn filled(grid: GridSpec, value: u8) -> Self {
        Self {
            data: vec![value; grid.len()],
            grid,
            nodata: None,
        }
    }

    pub fn with_nodata(mut self, nodata: Option<u8>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Check that deserialized data matches its grid.
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        check_len(&self.grid, self.data.len())
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.grid.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: u8) {
        self.data[row * self.grid.width + col] = val;
    }

    #[inline]
    pub fn is_nodata(&self, value: u8) -> bool {
        self.nodata == Some(value)
    }
}

// ── Mask ──────────────────────────────────────────────────────────────────────

/// Inclusion mask: non-zero = include, 0 = exclude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskRaster {
    pub data: Vec<u8>,
    pub grid: GridSpec,
}

impl MaskRaster {
    pub fn from_vec(grid: GridSpec, data: Vec<u8>) -> Result<Self> {
        check_len(&grid, data.len())?;
        Ok(Self { data, grid })
    }

    pub fn from_fn(grid: GridSpec, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(grid.len());
        for row in 0..grid.height {
            for col in 0..grid.width {
                data.push(u8::from(f(row, col)));
            }
        }
        Self { data, grid }
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        check_len(&self.grid, self.data.len())
    }

    #[inline]
    pub fn includes(&self, idx: usize) -> bool {
        self.data[idx] != 0
    }

    pub fn included_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

// ── Pixel area ────────────────────────────────────────────────────────────────

/// Area of every pixel in m².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRaster {
    pub data: Vec<f64>,
    pub grid: GridSpec,
}

impl AreaRaster {
    pub fn from_vec(grid: GridSpec, data: Vec<f64>) -> Result<Self> {
        check_len(&grid, data.len())?;
        Ok(Self { data, grid })
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        check_len(&self.grid, self.data.len())
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pixel_center_row_zero_is_south_edge() {
        let g = GridSpec::new(4, 2, 0.0, 4.0, 10.0, 12.0);
        assert_eq!(g.pixel_center(0, 0), (0.5, 10.5));
        assert_eq!(g.pixel_center(1, 3), (3.5, 11.5));
    }

    #[test]
    fn global_degree_grid_area_matches_sphere() {
        let g = GridSpec::new(360, 180, -180.0, 180.0, -90.0, 90.0);
        let total = g.pixel_areas().total();
        let sphere = 4.0 * std::f64::consts::PI * EARTH_RADIUS_M * EARTH_RADIUS_M;
        assert_relative_eq!(total, sphere, max_relative = 1e-9);
    }

    #[test]
    fn degree_pixels_shrink_towards_poles() {
        let g = GridSpec::new(1, 180, 0.0, 1.0, -90.0, 90.0);
        assert!(g.row_pixel_area(90) > g.row_pixel_area(170));
        assert_relative_eq!(g.row_pixel_area(0), g.row_pixel_area(179), max_relative = 1e-9);
    }

    #[test]
    fn metre_grid_uses_cell_size() {
        let g = GridSpec::metres(5, 5, 0.0, 50.0, 0.0, 50.0);
        let areas = g.pixel_areas();
        assert!(areas.data.iter().all(|&a| (a - 100.0).abs() < 1e-9));
        assert_relative_eq!(areas.total(), 2500.0);
    }

    #[test]
    fn alignment_tolerates_rounding_but_not_shifts() {
        let a = GridSpec::new(10, 10, 0.0, 1.0, 0.0, 1.0);
        let rounded = GridSpec::new(10, 10, 1e-12, 1.0, 0.0, 1.0 - 1e-12);
        let shifted = GridSpec::new(10, 10, 0.05, 1.05, 0.0, 1.0);
        let resized = GridSpec::new(20, 20, 0.0, 1.0, 0.0, 1.0);
        assert!(a.is_aligned_with(&rounded));
        assert!(!a.is_aligned_with(&shifted));
        assert!(!a.is_aligned_with(&resized));
        assert!(!a.is_aligned_with(&GridSpec::metres(10, 10, 0.0, 1.0, 0.0, 1.0)));
        assert!(matches!(
            a.ensure_aligned("class17", &shifted),
            Err(Error::InputAlignment { .. })
        ));
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let g = GridSpec::new(3, 3, 0.0, 3.0, 0.0, 3.0);
        assert!(matches!(
            CategoricalRaster::from_vec(g, vec![0; 8]),
            Err(Error::InvalidDimensions { len: 8, .. })
        ));
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        assert!(GridSpec::new(2, 2, 1.0, 0.0, 0.0, 1.0).validate().is_err());
        assert!(GridSpec::new(0, 2, 0.0, 1.0, 0.0, 1.0).validate().is_err());
        assert!(GridSpec::new(2, 2, 0.0, 1.0, -91.0, 1.0).validate().is_err());
        assert!(GridSpec::new(2, 2, 0.0, 1.0, 0.0, 1.0).validate().is_ok());
    }

    #[test]
    fn mask_from_fn_counts_included() {
        let g = GridSpec::new(4, 4, 0.0, 4.0, 0.0, 4.0);
        let m = MaskRaster::from_fn(g, |r, _| r < 2);
        assert_eq!(m.included_count(), 8);
        assert!(m.includes(0));
        assert!(!m.includes(15));
    }
}

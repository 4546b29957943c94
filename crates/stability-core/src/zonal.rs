//! Zonal area reduction: sum of pixel area per stability class.
//!
//! Grouped reduction over a class raster: restrict to the region, drop masked
//! and nodata pixels, group by class code and sum the matching pixel areas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::grid::{AreaRaster, CategoricalRaster, MaskRaster};
use crate::landcover::StabilityClass;
use crate::par::*;
use crate::region::{PixelWindow, RegionGeometry};

const N_CLASSES: usize = StabilityClass::ALL.len();

/// Limits on a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationOptions {
    /// When the region's candidate pixels exceed `max_pixels`, test region
    /// membership once per block of pixels instead of failing. Areas are still
    /// summed per pixel; only the region boundary becomes approximate.
    pub best_effort: bool,
    /// Maximum number of pixels tested against the region.
    pub max_pixels: u64,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            best_effort: true,
            max_pixels: 1_000_000_000,
        }
    }
}

impl AggregationOptions {
    pub fn exact() -> Self {
        Self {
            best_effort: false,
            ..Self::default()
        }
    }

    /// Smallest block side `k` for which the `k × k` blocks covering
    /// `window` number at most `max_pixels`, or an error when the budget is
    /// exceeded without best-effort.
    fn block_size(&self, window: &PixelWindow) -> Result<usize> {
        if self.max_pixels == 0 {
            return Err(Error::InvalidParameter {
                name: "max_pixels",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        let candidates = window.len() as u64;
        if candidates <= self.max_pixels {
            return Ok(1);
        }
        if !self.best_effort {
            return Err(Error::TooManyPixels {
                pixels: candidates,
                max_pixels: self.max_pixels,
            });
        }
        let (rows, cols) = (window.rows.len(), window.cols.len());
        let tested = |k: usize| (rows.div_ceil(k) * cols.div_ceil(k)) as u64;
        // The square-root estimate is a lower bound; thin windows need more.
        let mut k = (candidates as f64 / self.max_pixels as f64).sqrt().ceil().max(1.0) as usize;
        while tested(k) > self.max_pixels {
            k += 1;
        }
        Ok(k)
    }
}

/// Area and pixel count of one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassArea {
    pub area: f64,
    pub pixels: u64,
}

/// Total area per stability class present in the reduction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaTable {
    entries: BTreeMap<StabilityClass, ClassArea>,
}

/// Grouped form `{"groups": [{"class": k, "sum": area}, ...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedAreas {
    pub groups: Vec<AreaGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaGroup {
    pub class: u8,
    pub name: String,
    pub sum: f64,
    pub pixels: u64,
}

impl AreaTable {
    pub fn area(&self, class: StabilityClass) -> Option<f64> {
        self.entries.get(&class).map(|e| e.area)
    }

    /// Area of `class`, zero when absent.
    pub fn area_or_zero(&self, class: StabilityClass) -> f64 {
        self.area(class).unwrap_or(0.0)
    }

    pub fn pixels(&self, class: StabilityClass) -> u64 {
        self.entries.get(&class).map_or(0, |e| e.pixels)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_area(&self) -> f64 {
        self.entries.values().map(|e| e.area).sum()
    }

    /// Area of the classes that did not change over the four years.
    pub fn stable_area(&self) -> f64 {
        self.entries
            .iter()
            .filter(|(class, _)| class.is_stable())
            .map(|(_, e)| e.area)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StabilityClass, ClassArea)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    pub fn to_groups(&self) -> GroupedAreas {
        GroupedAreas {
            groups: self
                .iter()
                .map(|(class, e)| AreaGroup {
                    class: class.code(),
                    name: class.name().to_string(),
                    sum: e.area,
                    pixels: e.pixels,
                })
                .collect(),
        }
    }
}

impl Serialize for AreaTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_groups().serialize(serializer)
    }
}

#[derive(Clone, Copy, Default)]
struct RowSums {
    area: [f64; N_CLASSES],
    pixels: [u64; N_CLASSES],
    unknown: u64,
}

/// Sum `areas` per class of `classes` over the pixels of `region`,
/// optionally restricted to pixels where `mask` is non-zero.
///
/// A region disjoint from the raster yields an empty table. A misaligned
/// mask is a `MaskMismatch`; a misaligned area raster an `InputAlignment`;
/// data not matching its grid an `InvalidDimensions`.
/// Row partial sums are merged in row order, so the result does not depend
/// on threading.
pub fn zonal_areas(
    classes: &CategoricalRaster,
    mask: Option<&MaskRaster>,
    region: &RegionGeometry,
    areas: &AreaRaster,
    options: &AggregationOptions,
) -> Result<AreaTable> {
    let grid = classes.grid;
    grid.ensure_aligned("pixel area raster", &areas.grid)?;
    if let Some(m) = mask {
        if !grid.is_aligned_with(&m.grid) {
            return Err(Error::MaskMismatch {
                expected: grid,
                found: m.grid,
            });
        }
        m.validate()?;
    }
    classes.validate()?;
    areas.validate()?;

    let Some(window) = region.pixel_window(&grid).filter(|w| !w.is_empty()) else {
        debug!("region does not intersect the raster; empty area table");
        return Ok(AreaTable::default());
    };

    let block = options.block_size(&window)?;
    let cover = region.cover(&grid, &window, block);
    if block > 1 {
        debug!(
            candidates = window.len(),
            max_pixels = options.max_pixels,
            block,
            tested = cover.tested_points(),
            "best-effort: region membership evaluated per pixel block"
        );
    }

    let rows: Vec<RowSums> = window
        .rows
        .clone()
        .into_par_iter()
        .map(|row| {
            let mut sums = RowSums::default();
            for col in window.cols.clone() {
                if !cover.contains(row, col) {
                    continue;
                }
                let idx = row * grid.width + col;
                if mask.is_some_and(|m| !m.includes(idx)) {
                    continue;
                }
                let code = classes.data[idx];
                if classes.is_nodata(code) {
                    continue;
                }
                match StabilityClass::from_code(code) {
                    Some(class) => {
                        let k = class.code() as usize;
                        sums.area[k] += areas.data[idx];
                        sums.pixels[k] += 1;
                    }
                    None => sums.unknown += 1,
                }
            }
            sums
        })
        .collect();

    let mut total = RowSums::default();
    for r in &rows {
        for k in 0..N_CLASSES {
            total.area[k] += r.area[k];
            total.pixels[k] += r.pixels[k];
        }
        total.unknown += r.unknown;
    }
    if total.unknown > 0 {
        warn!(pixels = total.unknown, "pixels with non-class codes skipped in area reduction");
    }

    let entries = StabilityClass::ALL
        .iter()
        .filter(|c| total.pixels[c.code() as usize] > 0)
        .map(|&c| {
            let k = c.code() as usize;
            (
                c,
                ClassArea {
                    area: total.area[k],
                    pixels: total.pixels[k],
                },
            )
        })
        .collect();

    Ok(AreaTable { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridSpec;
    use crate::reclassify::OUTPUT_NODATA;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    fn grid() -> GridSpec {
        GridSpec::metres(10, 10, 0.0, 100.0, 0.0, 100.0)
    }

    fn random_classes(seed: u64) -> CategoricalRaster {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let data = (0..grid().len()).map(|_| rng.gen_range(0..7u8)).collect();
        CategoricalRaster::from_vec(grid(), data).unwrap()
    }

    #[test]
    fn area_is_conserved_over_full_coverage() {
        let g = grid();
        let classes = random_classes(1);
        let areas = g.pixel_areas();
        let region = RegionGeometry::covering(&g).unwrap();
        let table = zonal_areas(&classes, None, &region, &areas, &AggregationOptions::default()).unwrap();
        assert_relative_eq!(table.total_area(), areas.total(), max_relative = 1e-12);
        let pixels: u64 = table.iter().map(|(_, e)| e.pixels).sum();
        assert_eq!(pixels, 100);
    }

    #[test]
    fn groups_by_class_code() {
        let g = grid();
        let mut classes = CategoricalRaster::filled(g, 3);
        for col in 0..10 {
            classes.set(0, col, 4);
        }
        let region = RegionGeometry::covering(&g).unwrap();
        let table = zonal_areas(&classes, None, &region, &g.pixel_areas(), &AggregationOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table.area_or_zero(StabilityClass::EvergreenSenesced), 1000.0);
        assert_relative_eq!(table.area_or_zero(StabilityClass::StableEvergreen), 9000.0);
        assert_eq!(table.area(StabilityClass::StableSenesced), None);
        assert_eq!(table.pixels(StabilityClass::StableEvergreen), 90);
        assert_relative_eq!(table.stable_area(), 9000.0);
    }

    #[test]
    fn masking_never_increases_area() {
        let g = grid();
        let classes = random_classes(2);
        let areas = g.pixel_areas();
        let region = RegionGeometry::rect(5.0, 5.0, 85.0, 70.0).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mask = MaskRaster::from_fn(g, |_, _| rng.gen_bool(0.4));
        let opts = AggregationOptions::default();

        let full = zonal_areas(&classes, None, &region, &areas, &opts).unwrap();
        let masked = zonal_areas(&classes, Some(&mask), &region, &areas, &opts).unwrap();
        for class in StabilityClass::ALL {
            assert!(masked.area_or_zero(class) <= full.area_or_zero(class), "{class}");
        }
        assert!(masked.total_area() < full.total_area());
    }

    #[test]
    fn disjoint_region_yields_empty_table() {
        let g = grid();
        let region = RegionGeometry::rect(500.0, 500.0, 600.0, 600.0).unwrap();
        let table = zonal_areas(&random_classes(4), None, &region, &g.pixel_areas(), &AggregationOptions::default())
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.to_groups().groups.len(), 0);
    }

    #[test]
    fn misaligned_mask_is_a_mask_mismatch() {
        let g = grid();
        let mask = MaskRaster::from_fn(GridSpec::metres(5, 5, 0.0, 100.0, 0.0, 100.0), |_, _| true);
        let region = RegionGeometry::covering(&g).unwrap();
        let err = zonal_areas(&random_classes(5), Some(&mask), &region, &g.pixel_areas(), &AggregationOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MaskMismatch { .. }));
    }

    #[test]
    fn misaligned_area_raster_is_an_alignment_error() {
        let g = grid();
        let other = GridSpec::metres(10, 10, 10.0, 110.0, 0.0, 100.0);
        let region = RegionGeometry::covering(&g).unwrap();
        let err = zonal_areas(&random_classes(6), None, &region, &other.pixel_areas(), &AggregationOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InputAlignment { .. }));
    }

    #[test]
    fn nodata_pixels_are_skipped() {
        let g = grid();
        let mut classes = CategoricalRaster::filled(g, 2).with_nodata(Some(OUTPUT_NODATA));
        classes.set(5, 5, OUTPUT_NODATA);
        let region = RegionGeometry::covering(&g).unwrap();
        let table = zonal_areas(&classes, None, &region, &g.pixel_areas(), &AggregationOptions::default()).unwrap();
        assert_eq!(table.pixels(StabilityClass::StableSenesced), 99);
    }

    #[test]
    fn exceeding_max_pixels_without_best_effort_fails() {
        let g = grid();
        let region = RegionGeometry::covering(&g).unwrap();
        let opts = AggregationOptions { best_effort: false, max_pixels: 50 };
        let err = zonal_areas(&random_classes(7), None, &region, &g.pixel_areas(), &opts).unwrap_err();
        assert!(matches!(err, Error::TooManyPixels { pixels: 100, max_pixels: 50 }));
    }

    #[test]
    fn best_effort_matches_exact_on_block_aligned_region() {
        let g = grid();
        let classes = random_classes(8);
        let areas = g.pixel_areas();
        let region = RegionGeometry::rect(0.0, 0.0, 40.0, 80.0).unwrap();
        // 32 candidates, budget 8: block side 2.
        let approx_opts = AggregationOptions { best_effort: true, max_pixels: 8 };
        let exact = zonal_areas(&classes, None, &region, &areas, &AggregationOptions::exact()).unwrap();
        let approx = zonal_areas(&classes, None, &region, &areas, &approx_opts).unwrap();
        assert_eq!(exact, approx);
    }

    #[test]
    fn best_effort_respects_budget_on_thin_window() {
        let g = GridSpec::metres(1000, 1, 0.0, 1000.0, 0.0, 1.0);
        let region = RegionGeometry::covering(&g).unwrap();
        let window = region.pixel_window(&g).unwrap();
        assert_eq!((window.rows.len(), window.cols.len()), (1, 1000));

        let opts = AggregationOptions { best_effort: true, max_pixels: 10 };
        let block = opts.block_size(&window).unwrap();
        let cover = region.cover(&g, &window, block);
        assert!(cover.tested_points() <= 10, "block {block} tested {}", cover.tested_points());
        assert_eq!(block, 100);

        let classes = CategoricalRaster::filled(g, 3);
        let table = zonal_areas(&classes, None, &region, &g.pixel_areas(), &opts).unwrap();
        assert_eq!(table.pixels(StabilityClass::StableEvergreen), 1000);
    }

    #[test]
    fn block_size_never_exceeds_budget() {
        let opts = AggregationOptions { best_effort: true, max_pixels: 7 };
        for (rows, cols) in [(1, 50), (3, 40), (13, 13), (40, 2), (9, 1)] {
            let window = PixelWindow { rows: 0..rows, cols: 0..cols };
            let k = opts.block_size(&window).unwrap();
            assert!(rows.div_ceil(k) * cols.div_ceil(k) <= 7, "{rows}x{cols} block {k}");
            if k > 1 {
                let finer = k - 1;
                assert!(rows.div_ceil(finer) * cols.div_ceil(finer) > 7, "{rows}x{cols} block {k} not minimal");
            }
        }
    }

    #[test]
    fn mis_sized_mask_is_invalid_dimensions() {
        let g = grid();
        let mut mask = MaskRaster::from_fn(g, |_, _| true);
        mask.data.truncate(40);
        let region = RegionGeometry::covering(&g).unwrap();
        let err = zonal_areas(&random_classes(10), Some(&mask), &region, &g.pixel_areas(), &AggregationOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { width: 10, height: 10, len: 40 }));
    }

    #[test]
    fn mis_sized_area_raster_is_invalid_dimensions() {
        let g = grid();
        let mut areas = g.pixel_areas();
        areas.data.pop();
        let region = RegionGeometry::covering(&g).unwrap();
        let err = zonal_areas(&random_classes(11), None, &region, &areas, &AggregationOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { len: 99, .. }));
    }

    #[test]
    fn reduction_is_idempotent() {
        let g = grid();
        let classes = random_classes(9);
        let region = RegionGeometry::rect(12.0, 3.0, 77.0, 91.0).unwrap();
        let a = zonal_areas(&classes, None, &region, &g.pixel_areas(), &AggregationOptions::default()).unwrap();
        let b = zonal_areas(&classes, None, &region, &g.pixel_areas(), &AggregationOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_as_groups() {
        let g = grid();
        let classes = CategoricalRaster::filled(g, 1);
        let region = RegionGeometry::covering(&g).unwrap();
        let table = zonal_areas(&classes, None, &region, &g.pixel_areas(), &AggregationOptions::default()).unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["groups"][0]["class"], 1);
        assert_eq!(json["groups"][0]["sum"], 10000.0);
    }
}

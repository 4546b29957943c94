//! Per-pixel stability reclassification of four yearly land-cover layers.
//!
//! Rules are evaluated in strict priority order, first match wins:
//!
//! | # | condition                                         | class |
//! |---|---------------------------------------------------|-------|
//! | 1 | all years non-vegetated                           | 1     |
//! | 2 | all years senesced                                | 2     |
//! | 3 | all years evergreen                               | 3     |
//! | 4 | a year evergreen and another year senesced        | 4     |
//! | 5 | a year non-vegetated and every other year < 2     | 5     |
//! | 6 | a year non-vegetated and another year evergreen   | 6     |
//! | 7 | otherwise                                         | 0     |
//!
//! The rules are compiled at build time into an 81-entry table indexed by the
//! base-3 tuple, which is what pixel evaluation reads.

use serde::Serialize;
use tracing::{debug, warn};

use crate::grid::CategoricalRaster;
use crate::landcover::{LandCover, StabilityClass};
use crate::observations::{YearlyObservationSet, N_YEARS};
use crate::par::*;

/// Output code written where any input year is nodata or outside the region.
pub const OUTPUT_NODATA: u8 = 255;

/// Number of distinct in-domain input tuples (3^4).
pub const N_TUPLES: usize = 81;

// ── Decision rules ────────────────────────────────────────────────────────────

const NON_VEGETATED: u8 = LandCover::NonVegetated as u8;
const SENESCED: u8 = LandCover::Senesced as u8;
const EVERGREEN: u8 = LandCover::Evergreen as u8;

const fn all_equal(y: [u8; N_YEARS], v: u8) -> bool {
    y[0] == v && y[1] == v && y[2] == v && y[3] == v
}

/// Some year `k` equals `anchor` and some year `j != k` equals `other`.
const fn anchor_with_other(y: [u8; N_YEARS], anchor: u8, other: u8) -> bool {
    let mut k = 0;
    while k < N_YEARS {
        if y[k] == anchor {
            let mut j = 0;
            while j < N_YEARS {
                if j != k && y[j] == other {
                    return true;
                }
                j += 1;
            }
        }
        k += 1;
    }
    false
}

/// Some year `k` equals `anchor` and every year `j != k` is below `bound`.
const fn anchor_with_rest_below(y: [u8; N_YEARS], anchor: u8, bound: u8) -> bool {
    let mut k = 0;
    while k < N_YEARS {
        if y[k] == anchor {
            let mut rest_below = true;
            let mut j = 0;
            while j < N_YEARS {
                if j != k && y[j] >= bound {
                    rest_below = false;
                }
                j += 1;
            }
            if rest_below {
                return true;
            }
        }
        k += 1;
    }
    false
}

const fn in_domain(y: [u8; N_YEARS]) -> bool {
    y[0] <= EVERGREEN && y[1] <= EVERGREEN && y[2] <= EVERGREEN && y[3] <= EVERGREEN
}

/// Apply the ordered rule list to one tuple of yearly codes, oldest first.
///
/// Tuples containing a code outside {0, 1, 2} are `Unclassified`; callers
/// that care about data quality should use [`classify`] and count them.
pub const fn decide(y: [u8; N_YEARS]) -> StabilityClass {
    if !in_domain(y) {
        return StabilityClass::Unclassified;
    }
    if all_equal(y, NON_VEGETATED) {
        return StabilityClass::StableNonVegetated;
    }
    if all_equal(y, SENESCED) {
        return StabilityClass::StableSenesced;
    }
    if all_equal(y, EVERGREEN) {
        return StabilityClass::StableEvergreen;
    }
    if anchor_with_other(y, EVERGREEN, SENESCED) {
        return StabilityClass::EvergreenSenesced;
    }
    if anchor_with_rest_below(y, NON_VEGETATED, EVERGREEN) {
        return StabilityClass::NonVegetatedMixed;
    }
    if anchor_with_other(y, NON_VEGETATED, EVERGREEN) {
        return StabilityClass::NonVegetatedEvergreen;
    }
    StabilityClass::Unclassified
}

#[inline]
const fn tuple_index(y: [u8; N_YEARS]) -> usize {
    y[0] as usize * 27 + y[1] as usize * 9 + y[2] as usize * 3 + y[3] as usize
}

const fn tuple_from_index(i: usize) -> [u8; N_YEARS] {
    [(i / 27) as u8, (i / 9 % 3) as u8, (i / 3 % 3) as u8, (i % 3) as u8]
}

const fn build_table() -> [StabilityClass; N_TUPLES] {
    let mut table = [StabilityClass::Unclassified; N_TUPLES];
    let mut i = 0;
    while i < N_TUPLES {
        table[i] = decide(tuple_from_index(i));
        i += 1;
    }
    table
}

static DECISION_TABLE: [StabilityClass; N_TUPLES] = build_table();

/// Table lookup for one tuple; `None` if any code is out of domain.
#[inline]
pub fn classify(y: [u8; N_YEARS]) -> Option<StabilityClass> {
    if in_domain(y) {
        Some(DECISION_TABLE[tuple_index(y)])
    } else {
        None
    }
}

/// Every in-domain tuple with its class, in base-3 order.
pub fn decision_table() -> impl Iterator<Item = ([u8; N_YEARS], StabilityClass)> {
    (0..N_TUPLES).map(|i| (tuple_from_index(i), DECISION_TABLE[i]))
}

// ── Raster evaluation ─────────────────────────────────────────────────────────

/// Count of pixels carrying codes outside the land-cover enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DomainViolations {
    /// Offending pixels per year, oldest first.
    pub per_year: [u64; N_YEARS],
    /// Pixels with at least one offending year (reported as class 0).
    pub pixels: u64,
}

impl DomainViolations {
    pub fn is_empty(&self) -> bool {
        self.pixels == 0
    }

    fn merge(&mut self, other: &DomainViolations) {
        for (a, b) in self.per_year.iter_mut().zip(other.per_year) {
            *a += b;
        }
        self.pixels += other.pixels;
    }
}

/// Output of [`reclassify`].
#[derive(Debug, Clone)]
pub struct Reclassification {
    /// Stability class codes; `OUTPUT_NODATA` where any year is nodata.
    pub raster: CategoricalRaster,
    pub violations: DomainViolations,
}

fn reclassify_row(obs: &YearlyObservationSet, row: usize) -> (Vec<u8>, DomainViolations) {
    let width = obs.grid().width;
    let mut out = Vec::with_capacity(width);
    let mut violations = DomainViolations::default();

    for idx in row * width..(row + 1) * width {
        if obs.is_nodata_at(idx) {
            out.push(OUTPUT_NODATA);
            continue;
        }
        let codes = obs.codes_at(idx);
        match classify(codes) {
            Some(class) => out.push(class.code()),
            None => {
                for (count, &c) in violations.per_year.iter_mut().zip(&codes) {
                    if c > EVERGREEN {
                        *count += 1;
                    }
                }
                violations.pixels += 1;
                out.push(StabilityClass::Unclassified.code());
            }
        }
    }
    (out, violations)
}

/// Reclassify every pixel of the yearly set into a stability class raster.
///
/// Rows are evaluated independently (in parallel with the `threading`
/// feature) and concatenated in row order, so the output does not depend on
/// the degree of parallelism. Out-of-domain codes are counted, logged and
/// reported as class 0 rather than aborting the batch.
pub fn reclassify(obs: &YearlyObservationSet) -> Reclassification {
    let grid = *obs.grid();

    let rows: Vec<(Vec<u8>, DomainViolations)> = (0..grid.height)
        .into_par_iter()
        .map(|row| reclassify_row(obs, row))
        .collect();

    let mut data = Vec::with_capacity(grid.len());
    let mut violations = DomainViolations::default();
    for (row, v) in rows {
        data.extend_from_slice(&row);
        violations.merge(&v);
    }

    if !violations.is_empty() {
        warn!(
            pixels = violations.pixels,
            per_year = ?violations.per_year,
            years = ?obs.years(),
            "category codes outside {{0, 1, 2}}; pixels reported as unclassified"
        );
    }
    debug!(width = grid.width, height = grid.height, "reclassified yearly observations");

    Reclassification {
        raster: CategoricalRaster {
            data,
            grid,
            nodata: Some(OUTPUT_NODATA),
        },
        violations,
    }
}

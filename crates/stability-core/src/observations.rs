//! The four co-registered yearly classifications consumed by the reclassifier.

use crate::error::{Error, Result};
use crate::grid::{CategoricalRaster, GridSpec};

/// Number of yearly layers the decision table is defined over.
pub const N_YEARS: usize = 4;

/// Exactly four yearly classified rasters, oldest first, all on one grid.
/// Immutable once assembled.
#[derive(Debug, Clone)]
pub struct YearlyObservationSet {
    years: [u16; N_YEARS],
    rasters: [CategoricalRaster; N_YEARS],
}

impl YearlyObservationSet {
    /// Assemble the set, rejecting misaligned rasters and unordered years.
    pub fn new(observations: [(u16, CategoricalRaster); N_YEARS]) -> Result<Self> {
        let [(y0, r0), (y1, r1), (y2, r2), (y3, r3)] = observations;
        let years = [y0, y1, y2, y3];
        let rasters = [r0, r1, r2, r3];

        if years.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter {
                name: "years",
                value: format!("{years:?}"),
                reason: "years must be strictly increasing".into(),
            });
        }

        for r in &rasters {
            r.validate()?;
        }
        let reference = rasters[0].grid;
        for (year, r) in years.iter().zip(&rasters).skip(1) {
            reference.ensure_aligned(&format!("classification {year}"), &r.grid)?;
        }

        Ok(Self { years, rasters })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.rasters[0].grid
    }

    pub fn years(&self) -> [u16; N_YEARS] {
        self.years
    }

    pub fn rasters(&self) -> &[CategoricalRaster; N_YEARS] {
        &self.rasters
    }

    /// The four codes observed at flat pixel index `idx`, oldest first.
    #[inline]
    pub fn codes_at(&self, idx: usize) -> [u8; N_YEARS] {
        [
            self.rasters[0].data[idx],
            self.rasters[1].data[idx],
            self.rasters[2].data[idx],
            self.rasters[3].data[idx],
        ]
    }

    /// True if any year marks pixel `idx` as nodata.
    #[inline]
    pub fn is_nodata_at(&self, idx: usize) -> bool {
        self.rasters.iter().any(|r| r.is_nodata(r.data[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(3, 2, -117.5, -117.2, 46.4, 46.6)
    }

    #[test]
    fn assembles_aligned_rasters() {
        let g = grid();
        let set = YearlyObservationSet::new([
            (2016, CategoricalRaster::filled(g, 0)),
            (2017, CategoricalRaster::filled(g, 1)),
            (2018, CategoricalRaster::filled(g, 2)),
            (2019, CategoricalRaster::filled(g, 1)),
        ])
        .unwrap();
        assert_eq!(set.years(), [2016, 2017, 2018, 2019]);
        assert_eq!(set.codes_at(4), [0, 1, 2, 1]);
        assert_eq!(*set.grid(), g);
    }

    #[test]
    fn rejects_misaligned_year() {
        let g = grid();
        let shifted = GridSpec::new(3, 2, -117.4, -117.1, 46.4, 46.6);
        let err = YearlyObservationSet::new([
            (2016, CategoricalRaster::filled(g, 0)),
            (2017, CategoricalRaster::filled(g, 0)),
            (2018, CategoricalRaster::filled(shifted, 0)),
            (2019, CategoricalRaster::filled(g, 0)),
        ])
        .unwrap_err();
        match err {
            Error::InputAlignment { what, .. } => assert_eq!(what, "classification 2018"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unordered_years() {
        let g = grid();
        let err = YearlyObservationSet::new([
            (2016, CategoricalRaster::filled(g, 0)),
            (2018, CategoricalRaster::filled(g, 0)),
            (2017, CategoricalRaster::filled(g, 0)),
            (2019, CategoricalRaster::filled(g, 0)),
        ]);
        assert!(matches!(err, Err(Error::InvalidParameter { name: "years", .. })));
    }

    #[test]
    fn nodata_in_any_year_marks_pixel() {
        let g = grid();
        let mut masked = CategoricalRaster::filled(g, 1).with_nodata(Some(255));
        masked.data[2] = 255;
        let set = YearlyObservationSet::new([
            (2016, CategoricalRaster::filled(g, 1)),
            (2017, masked),
            (2018, CategoricalRaster::filled(g, 1)),
            (2019, CategoricalRaster::filled(g, 1)),
        ])
        .unwrap();
        assert!(set.is_nodata_at(2));
        assert!(!set.is_nodata_at(0));
    }
}

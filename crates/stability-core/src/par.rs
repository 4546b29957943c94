//! Row-level parallelism for reclassification, region cover and zonal sums.
//!
//! Every caller maps raster rows (or block rows) to per-row results and
//! collects them into a `Vec` indexed by row; rayon's indexed `collect`
//! keeps that order, and so does the sequential fallback used without the
//! `threading` feature. Float partial sums are then folded in row order by
//! the caller, which makes area totals bit-identical across thread counts.
#[cfg(feature = "threading")]
pub use rayon::prelude::*;

#[cfg(not(feature = "threading"))]
mod sequential {
    /// `into_par_iter()` over plain iterators, so row loops compile unchanged.
    pub trait IntoParallelIterator {
        type Iter;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "threading"))]
pub use sequential::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_results_collect_in_row_order() {
        let rows: Vec<Vec<usize>> = (0..257usize)
            .into_par_iter()
            .map(|row| (0..row % 5).map(|c| row * 10 + c).collect())
            .collect();
        for (row, cells) in rows.iter().enumerate() {
            assert_eq!(cells.len(), row % 5);
            assert!(cells.iter().all(|&v| v / 10 == row));
        }
    }
}

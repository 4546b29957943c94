//! Error types for stability classification and zonal area reduction.

use thiserror::Error;

use crate::grid::GridSpec;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input rasters do not share grid, resolution or extent.
    #[error("{what} is not aligned with the reference grid: expected {expected}, found {found}")]
    InputAlignment {
        what: String,
        expected: GridSpec,
        found: GridSpec,
    },

    /// Mask raster misaligned with the classification raster.
    #[error("mask is not aligned with the classification raster: expected {expected}, found {found}")]
    MaskMismatch { expected: GridSpec, found: GridSpec },

    #[error("invalid raster dimensions: {width}x{height} with {len} values")]
    InvalidDimensions { width: usize, height: usize, len: usize },

    #[error("invalid region geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Reduction would touch more pixels than allowed and best-effort is off.
    #[error("region covers {pixels} pixels, exceeding max_pixels = {max_pixels}; enable best_effort or raise max_pixels")]
    TooManyPixels { pixels: u64, max_pixels: u64 },

    #[error("export '{description}' has {pixels} pixels, exceeding max_pixels = {max_pixels}")]
    ExportTooLarge {
        description: String,
        pixels: u64,
        max_pixels: u64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

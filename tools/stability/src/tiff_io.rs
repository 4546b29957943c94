//! Single-band 8-bit TIFF reading and writing.
//!
//! TIFF storage order: row 0 = northernmost (N→S).
//! Grid storage order: row 0 = min_y (S→N).
//! Row reversal happens here in both directions.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use stability_core::{CategoricalRaster, Error, GridSpec, Result};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

fn tiff_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{}: {e}", path.display()),
    ))
}

fn flip_rows(data: &[u8], width: usize) -> Vec<u8> {
    data.chunks_exact(width).rev().flatten().copied().collect()
}

/// Decode a U8 TIFF into S→N row order, checking its size against `grid`.
pub fn read_u8(path: &Path, grid: &GridSpec) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(path, e))?;
    let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, e))?;
    if width as usize != grid.width || height as usize != grid.height {
        return Err(tiff_error(
            path,
            format!("image is {width}x{height}, grid is {}x{}", grid.width, grid.height),
        ));
    }
    let data = match decoder.read_image().map_err(|e| tiff_error(path, e))? {
        DecodingResult::U8(v) => v,
        _ => return Err(tiff_error(path, "unexpected pixel type (expected U8)")),
    };
    if data.len() != grid.len() {
        return Err(tiff_error(path, "expected a single-band image"));
    }
    Ok(flip_rows(&data, grid.width))
}

/// Encode `raster` as a north-up Gray8 TIFF.
pub fn write_u8(path: &Path, raster: &CategoricalRaster) -> Result<()> {
    let grid = raster.grid;
    let north_up = flip_rows(&raster.data, grid.width);
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(file).map_err(|e| tiff_error(path, e))?;
    encoder
        .write_image::<colortype::Gray8>(grid.width as u32, grid.height as u32, &north_up)
        .map_err(|e| tiff_error(path, e))?;
    Ok(())
}

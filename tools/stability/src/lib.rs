//! File-backed collaborators for the stability pipeline: a JSON manifest
//! image source, a TIFF export sink and the TIFF codec they share.

pub mod manifest;
pub mod sink;
pub mod tiff_io;

pub use manifest::{Manifest, ManifestSource};
pub use sink::TiffSink;

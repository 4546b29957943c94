//! Map renderer: writes one PNG per yearly classification and one for the
//! clipped stability classes, using the standard map palettes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use stability::ManifestSource;
use stability_core::{render_rgba, CategoricalRaster, ImageSource, StabilityPipeline, VisParams};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Render yearly and stability class maps to PNG")]
struct Args {
    /// Path to the manifest JSON
    #[arg(short, long)]
    manifest: PathBuf,

    /// Output directory (created if absent)
    #[arg(short, long, default_value = "data/debug")]
    output: PathBuf,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn save_png(raster: &CategoricalRaster, params: &VisParams, path: &Path) -> Result<()> {
    let rgba = render_rgba(raster, params)?;
    let grid = raster.grid;
    let img = image::RgbaImage::from_raw(grid.width as u32, grid.height as u32, rgba)
        .context("RGBA buffer does not match the grid size")?;
    img.save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    info!(path = %path.display(), "saved");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;
    let source = ManifestSource::open(&args.manifest)?;

    // ── Yearly classifications ──────────────────────────────────────────────
    let observations = source.observations()?;
    let yearly = VisParams::yearly_classes();
    for (year, raster) in observations.years().iter().zip(observations.rasters()) {
        save_png(raster, &yearly, &args.output.join(format!("classes_{year}.png")))?;
    }

    // ── Stability classes ───────────────────────────────────────────────────
    let pipeline = StabilityPipeline::new(source.manifest().config.clone())?;
    let run = pipeline.run(&source)?;
    save_png(
        &run.classes,
        &VisParams::stability_classes(),
        &args.output.join("stability_classes.png"),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn verbose_flag_parses() {
        let args = Args::parse_from(["visualize", "--manifest", "m.json", "-v"]);
        assert!(args.verbose);
        assert_eq!(args.output, PathBuf::from("data/debug"));
        assert!(!Args::parse_from(["visualize", "-m", "m.json"]).verbose);
    }
}

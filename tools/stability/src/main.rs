/// Land-cover stability CLI: reclassifies four yearly classifications named
/// in a manifest, reports area per stability class over the region and the
/// mask, and exports the clipped class raster.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use stability::{ManifestSource, TiffSink};
use stability_core::reclassify::decision_table;
use stability_core::{AreaTable, ExportSink, JsonDirSink, StabilityPipeline};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "stability",
    version,
    about = "Multi-year land-cover stability classification and area per class"
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reclassify, aggregate and export the inputs named in a manifest
    Run {
        /// Path to the manifest JSON
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output directory (created if absent)
        #[arg(short, long, default_value = "stability_out")]
        output: PathBuf,

        /// Fail instead of coarsening when the region exceeds the pixel limit
        #[arg(long)]
        exact: bool,

        /// Override the configured pixel limit
        #[arg(long)]
        max_pixels: Option<u64>,

        /// Worker threads (0 = all cores)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Export format for the class raster
        #[arg(long, value_enum, default_value_t = ExportFormat::Tiff)]
        format: ExportFormat,
    },
    /// Print the 81-entry decision table
    Table,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Json,
    Tiff,
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            manifest,
            output,
            exact,
            max_pixels,
            threads,
            format,
        } => {
            if threads > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build_global()
                    .context("Failed to configure thread pool")?;
            }
            run(&manifest, &output, exact, max_pixels, format)
        }
        Commands::Table => {
            print_decision_table();
            Ok(())
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    // Only fails when a subscriber is already installed.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn run(
    manifest: &Path,
    output: &Path,
    exact: bool,
    max_pixels: Option<u64>,
    format: ExportFormat,
) -> Result<()> {
    let source = ManifestSource::open(manifest)?;
    let mut config = source.manifest().config.clone();
    if exact {
        config.best_effort = false;
    }
    if let Some(n) = max_pixels {
        config.max_pixels = n;
    }
    let pipeline = StabilityPipeline::new(config).context("Invalid configuration")?;
    let run = pipeline
        .run(&source)
        .with_context(|| format!("Stability run failed for {}", manifest.display()))?;

    fs::create_dir_all(output)
        .with_context(|| format!("Cannot create output directory {}", output.display()))?;

    let report_path = output.join("report.json");
    fs::write(&report_path, serde_json::to_string_pretty(&run.report)?)
        .with_context(|| format!("Cannot write {}", report_path.display()))?;
    info!(path = %report_path.display(), "wrote report");

    let mut sink: Box<dyn ExportSink> = match format {
        ExportFormat::Json => Box::new(JsonDirSink::new(output)),
        ExportFormat::Tiff => Box::new(TiffSink::new(output)),
    };
    pipeline
        .export(&run, sink.as_mut())
        .context("Export failed")?;

    print_table("Region", &run.report.region_areas);
    if let Some(masked) = &run.report.masked_areas {
        print_table("Mask", masked);
    }
    if !run.report.violations.is_empty() {
        println!(
            "\n{} pixel(s) held codes outside 0..=2 (per year: {:?}); they were left unclassified.",
            run.report.violations.pixels, run.report.violations.per_year
        );
    }
    Ok(())
}

fn print_table(title: &str, table: &AreaTable) {
    println!("\n{title}");
    println!("{:<5} {:<26} {:>16} {:>12}", "class", "name", "area_m2", "pixels");
    if table.is_empty() {
        println!("  (no classified pixels)");
        return;
    }
    for (class, entry) in table.iter() {
        println!(
            "{:<5} {:<26} {:>16.2} {:>12}",
            class.code(),
            class.name(),
            entry.area,
            entry.pixels
        );
    }
    let total = table.total_area();
    println!("{:<5} {:<26} {:>16.2}", "", "total", total);
    if total > 0.0 {
        println!("{:<5} {:<26} {:>15.1}%", "", "stable share", 100.0 * table.stable_area() / total);
    }
}

fn print_decision_table() {
    println!("y1 y2 y3 y4  class");
    for (y, class) in decision_table() {
        println!(" {}  {}  {}  {}  {class}", y[0], y[1], y[2], y[3]);
    }
}

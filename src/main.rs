use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env};
use log::info;

use scan_timing_core::{
    default_params, GridParams, RasterWriter, ScanOptions, ScanRasterizer, TileCatalog, TileId, TimeSource,
    TimingRaster,
};

/// Grid policy presets.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// One slack cell per side, corners snapped from ...9 up to ...0.
    Ahn3,
    /// No slack cells, corners truncated.
    Exact,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Clock {
    /// Ordinal of the point in the whole input stream.
    Stream,
    /// Unix seconds at the moment the point is processed.
    WallClock,
}

impl From<Clock> for TimeSource {
    fn from(clock: Clock) -> Self {
        match clock {
            Clock::Stream => TimeSource::StreamOrder,
            Clock::WallClock => TimeSource::WallClock,
        }
    }
}

/// Rasterize when each cell of a tiled LAS/LAZ survey was first and last scanned.
///
/// Writes a 3-band UInt32 GeoTIFF: entry time, exit time and active span.
#[derive(Parser, Debug)]
#[command(name = "scan-timing", version, about)]
struct Args {
    /// Directory containing the .laz/.las tiles (e.g. C_37EN1.LAZ).
    input_dir: PathBuf,

    /// Tile to start from, e.g. 37EN1.
    start_tile: TileId,

    /// Number of tiles to process in scan order.
    tile_count: usize,

    /// Output GeoTIFF path.
    output: PathBuf,

    /// Cells per tile along each axis.
    cell_count: usize,

    /// Record only every Nth point.
    thinning: u64,

    #[arg(long, value_enum, default_value_t = Preset::Ahn3)]
    preset: Preset,

    #[arg(long, value_enum, default_value_t = Clock::Stream)]
    time_source: Clock,
}

fn run<P: GridParams>(args: &Args, options: ScanOptions) -> Result<()> {
    let catalog = TileCatalog::scan(&args.input_dir)
        .with_context(|| format!("failed to scan {}", args.input_dir.display()))?;
    info!("found {} tiles in {}", catalog.len(), args.input_dir.display());

    let plan = catalog.plan(args.start_tile, args.tile_count)?;

    let outcome = ScanRasterizer::<P>::new(options).rasterize_las(&plan)?;

    for report in &outcome.reports {
        info!(
            "tile {}: {} points read, {} recorded, {} dropped",
            report.tile, report.stats.points_read, report.stats.points_recorded, report.stats.points_dropped
        );
    }

    write_output(&args.output, &outcome.raster)
}

fn write_output(path: &Path, raster: &TimingRaster) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    #[cfg(feature = "gdal")]
    let writer = scan_timing_core::GdalWriter;
    #[cfg(not(feature = "gdal"))]
    let writer = scan_timing_core::GeoTiffWriter;

    writer.write(path, raster)?;
    Ok(())
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let started = Instant::now();

    let options = ScanOptions::builder()
        .cell_count(args.cell_count)
        .thinning(args.thinning)
        .time_source(args.time_source.into())
        .build()?;

    match args.preset {
        Preset::Ahn3 => run::<default_params::Ahn3>(&args, options)?,
        Preset::Exact => run::<default_params::Exact>(&args, options)?,
    }

    info!("done in {:.1?}", started.elapsed());
    Ok(())
}

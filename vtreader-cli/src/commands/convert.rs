//! Convert command - turn a tile source into per-class GeoJSON files.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};
use vtreader::coord::{bbox_to_tile_range, TileRange};
use vtreader::pipeline::{DirectorySink, Pipeline};
use vtreader::source::LoadRequest;

use super::common::{progress_bar, BBox};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the convert command.
pub struct ConvertArgs {
    pub source: String,
    pub zoom: u8,
    pub bbox: Option<BBox>,
    pub tiles: Option<TileRange>,
    pub max_tiles: Option<usize>,
    pub output: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub no_format_check: bool,
    pub debug: bool,
}

/// Run the convert command.
pub fn run(args: ConvertArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("convert");
    let config = runner.config();

    let mut source = runner.open_source(&args.source, args.page_size)?;
    let scheme = source.scheme();

    let range = match (args.bbox, args.tiles) {
        (Some(b), _) => Some(bbox_to_tile_range(
            b.west, b.south, b.east, b.north, args.zoom, scheme,
        )?),
        (None, tiles) => tiles,
    };

    let request = LoadRequest {
        zoom: Some(args.zoom),
        range,
        max_tiles: args.max_tiles.or(config.source.max_tiles),
    };

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    let mut sink = DirectorySink::new(&output).map_err(|error| CliError::Output {
        path: output.clone(),
        error,
    })?;

    println!("Converting {}", source.name());
    println!("  Source: {}", source.source());
    println!("  Zoom:   {} ({})", args.zoom, scheme);
    if let Some(range) = range {
        println!(
            "  Tiles:  {}..={} x {}..={} ({} tiles)",
            range.min_col,
            range.max_col,
            range.min_row,
            range.max_row,
            range.len()
        );
    }
    println!("  Output: {}", output.display());
    println!();
    println!("Press Ctrl+C to stop early and keep what was loaded");

    let cancel = source.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        warn!(error = %e, "Failed to install Ctrl+C handler");
    }

    let (bar, callback) = progress_bar();
    source.set_progress_handler(callback);

    let pipeline = Pipeline::new(config.codec.codec(), config.reproject.reprojector())
        .with_format_check(!args.no_format_check);

    let start = Instant::now();
    let result = pipeline.run(source.as_mut(), &request, &mut sink, None);
    bar.finish_and_clear();
    source.close();
    let report = result?;

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Conversion complete");

    println!();
    if report.cancelled {
        println!("Cancelled - partial results written.");
    }
    println!(
        "Tiles:       {} loaded, {} decoded, {} undecodable, {} failed to fetch",
        report.tiles_loaded, report.tiles_decoded, report.decode_failures, report.fetch_failures
    );
    println!(
        "Features:    {} added, {} rejected",
        report.features_added, report.features_rejected
    );
    println!(
        "Collections: {} written to {}",
        report.collections_written,
        output.display()
    );
    println!("Finished in {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}

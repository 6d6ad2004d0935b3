//! vtreader CLI - Command-line interface
//!
//! Converts Mapbox vector tiles from MBTiles archives or TileJSON URLs into
//! GeoJSON feature collections, one file per `layer.class.subclass` path.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vtreader::coord::{TileRange, MAX_ZOOM};

use commands::common::{parse_bbox, parse_tile_range, BBox};
use commands::config::ConfigCommands;

#[derive(Parser)]
#[command(name = "vtreader")]
#[command(version, about = "Convert Mapbox vector tiles into GeoJSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a tile source into per-class GeoJSON files
    Convert {
        /// MBTiles file or http(s) TileJSON URL
        source: String,

        /// Zoom level to read (0-24)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_ZOOM)))]
        zoom: u8,

        /// Geographic bounds as W,S,E,N in degrees
        #[arg(
            long,
            value_parser = parse_bbox,
            conflicts_with = "tiles",
            allow_hyphen_values = true
        )]
        bbox: Option<BBox>,

        /// Tile bounds as C0,R0,C1,R1 in the source's row scheme
        #[arg(long, value_parser = parse_tile_range)]
        tiles: Option<TileRange>,

        /// Maximum number of tiles to read
        #[arg(long)]
        max_tiles: Option<usize>,

        /// Output directory (default from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Concurrent fetches per page for remote sources
        #[arg(long)]
        page_size: Option<usize>,

        /// Skip the vector tile format check
        #[arg(long)]
        no_format_check: bool,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Show tile set metadata
    Info {
        /// MBTiles file or http(s) TileJSON URL
        source: String,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            source,
            zoom,
            bbox,
            tiles,
            max_tiles,
            output,
            page_size,
            no_format_check,
            debug,
        } => commands::convert::run(commands::convert::ConvertArgs {
            source,
            zoom,
            bbox,
            tiles,
            max_tiles,
            output,
            page_size,
            no_format_check,
            debug,
        }),
        Commands::Info { source, debug } => {
            commands::info::run(commands::info::InfoArgs { source, debug })
        }
        Commands::Config(command) => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

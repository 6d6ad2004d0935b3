//! vtreader - Mapbox vector tile ingestion
//!
//! This library reads Mapbox vector tiles from MBTiles archives or remote
//! TileJSON tile sets, decodes their layers and features, reprojects every
//! coordinate into Web Mercator meters and groups the features into GeoJSON
//! feature collections keyed by `layer[.class[.subclass]]`.
//!
//! # Example
//!
//! ```no_run
//! use vtreader::pipeline::{DirectorySink, Pipeline};
//! use vtreader::source::{ArchiveTileSource, LoadRequest};
//!
//! let mut source = ArchiveTileSource::open("zurich.mbtiles")?;
//! let mut sink = DirectorySink::new("geojson")?;
//! let report = Pipeline::default().run(&mut source, &LoadRequest::zoom(14), &mut sink, None)?;
//! println!("wrote {} collections", report.collections_written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod codec;
pub mod config;
pub mod coord;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod source;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

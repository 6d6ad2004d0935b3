//! Tile sources.
//!
//! A [`TileSource`] yields raw `(coordinate, payload)` pairs for a zoom level
//! and optional tile range. Two variants exist:
//!
//! - [`ArchiveTileSource`] reads an MBTiles (SQLite) archive
//! - [`RemoteTileSource`] fetches tiles over HTTP from a TileJSON descriptor,
//!   in small concurrent pages
//!
//! Both suppress tiles they already delivered during their lifetime, honour a
//! `max_tiles` cap, report progress and poll a cooperative cancel flag.

mod archive;
mod progress;
mod remote;
mod tilejson;

pub use archive::ArchiveTileSource;
pub use progress::{CancelFlag, LoadedTileSet, ProgressCallback, ProgressEvent, ProgressHandle};
pub use remote::{RemoteTileSource, DEFAULT_PAGE_SIZE};
pub use tilejson::TileJson;

use std::path::PathBuf;

use thiserror::Error;

use crate::coord::{CoordError, TileCoord, TileRange, TileScheme, MAX_ZOOM};
use crate::http::NetworkError;

/// Errors raised by tile sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source input itself is unusable (bad URL, bad template, ...).
    #[error("Invalid tile source: {0}")]
    Config(String),

    /// The path does not point at an SQLite archive.
    #[error("'{}' is not a valid MBTiles archive", .0.display())]
    NotAnArchive(PathBuf),

    /// The TileJSON descriptor could not be fetched or parsed.
    #[error("Failed to load tile descriptor from {url}: {reason}")]
    Descriptor { url: String, reason: String },

    /// A query against the archive failed.
    #[error("Tile store query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// A single fetch failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The request addresses tiles that cannot exist.
    #[error("Invalid load request: {0}")]
    Request(#[from] CoordError),
}

/// One tile as delivered by a source. The payload is usually compressed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTile {
    pub coord: TileCoord,
    pub payload: Vec<u8>,
}

/// What to load.
///
/// The range is expressed in the source's own scheme. `max_tiles` caps the
/// number of tiles considered for delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadRequest {
    pub zoom: Option<u8>,
    pub range: Option<TileRange>,
    pub max_tiles: Option<usize>,
}

impl LoadRequest {
    /// Request for every tile at `zoom`.
    pub fn zoom(zoom: u8) -> Self {
        Self {
            zoom: Some(zoom),
            ..Self::default()
        }
    }

    pub fn with_range(mut self, range: TileRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_max_tiles(mut self, max_tiles: usize) -> Self {
        self.max_tiles = Some(max_tiles);
        self
    }

    /// Rejects zoom levels above [`MAX_ZOOM`].
    pub fn validate(&self) -> Result<(), CoordError> {
        match self.zoom {
            Some(zoom) if zoom > MAX_ZOOM => Err(CoordError::InvalidZoom(zoom)),
            _ => Ok(()),
        }
    }
}

/// Result of one `load_tiles` call.
///
/// `tiles` always holds everything collected before the call stopped, so a
/// cancelled or failed load is still usable.
#[derive(Debug, Default)]
pub struct TileBatch {
    pub tiles: Vec<RawTile>,
    /// Tiles skipped because this source delivered them before.
    pub skipped_duplicates: usize,
    /// Tiles whose fetch failed; absent from `tiles`.
    pub failed: Vec<(TileCoord, NetworkError)>,
    /// True when the cancel flag stopped the load early.
    pub cancelled: bool,
    /// Query or connection failure that ended the load.
    pub error: Option<SourceError>,
}

impl TileBatch {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// True when the load ran to completion without error or cancellation.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.error.is_none()
    }
}

/// Uniform access to archive and remote tile stores.
pub trait TileSource: Send {
    /// Path or URL the source was opened from.
    fn source(&self) -> &str;

    /// Human-readable name of the tile set.
    fn name(&self) -> String;

    fn min_zoom(&mut self) -> Option<u8>;

    fn max_zoom(&mut self) -> Option<u8>;

    /// Mask level advertised by the tile set, if any.
    fn mask_level(&mut self) -> Option<String>;

    /// Row numbering convention of the stored tiles.
    fn scheme(&mut self) -> TileScheme;

    /// Loads tiles matching `request`.
    ///
    /// `for_each` runs once per processed item, before the cancel flag is
    /// polled. The cancel flag is reset when the call starts.
    fn load_tiles(&mut self, request: &LoadRequest, for_each: Option<&dyn Fn()>) -> TileBatch;

    /// Reads one payload without recording it as delivered.
    fn sample_payload(&mut self) -> Result<Option<Vec<u8>>, SourceError>;

    /// Installs the progress callback.
    fn set_progress_handler(&mut self, handler: ProgressCallback);

    /// Requests cancellation of the running load.
    fn cancel(&self) {
        self.cancel_flag().cancel();
    }

    /// Handle to the cancel flag, usable from other threads.
    fn cancel_flag(&self) -> CancelFlag;

    /// Tiles delivered so far.
    fn loaded_tiles(&self) -> &LoadedTileSet;

    /// Releases underlying resources. Safe to call more than once.
    fn close(&mut self) {}
}

/// Returns true if `input` names a remote tile set.
pub fn is_remote(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Opens an archive path or a TileJSON URL.
pub fn open_source(
    input: &str,
    page_size: usize,
    timeout_secs: u64,
) -> Result<Box<dyn TileSource>, SourceError> {
    if is_remote(input) {
        let source = RemoteTileSource::connect(input, timeout_secs)?.with_page_size(page_size);
        Ok(Box::new(source))
    } else {
        Ok(Box::new(ArchiveTileSource::open(input)?))
    }
}

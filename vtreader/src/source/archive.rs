//! MBTiles archive source.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, error, info, trace, warn};

use super::{
    CancelFlag, LoadRequest, LoadedTileSet, ProgressCallback, ProgressHandle, RawTile,
    SourceError, TileBatch, TileSource,
};
use crate::coord::{TileCoord, TileScheme};

/// Leading bytes of every SQLite 3 database file.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// One row of the `tiles` table.
#[derive(Debug)]
struct TileRow {
    zoom: u8,
    col: u32,
    row: u32,
    data: Vec<u8>,
}

/// Tile source backed by an MBTiles (SQLite) archive.
///
/// The connection is opened read-only on first use. Metadata lookups and the
/// zoom fallbacks are cached for the lifetime of the source.
pub struct ArchiveTileSource {
    path: PathBuf,
    source: String,
    conn: Option<Connection>,
    metadata_cache: HashMap<String, Option<String>>,
    zoom_cache: HashMap<&'static str, Option<u8>>,
    loaded: LoadedTileSet,
    progress: ProgressHandle,
    cancel: CancelFlag,
}

impl ArchiveTileSource {
    /// Opens an archive after checking that the file is an SQLite database.
    ///
    /// The connection itself is deferred until the first query.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();

        if !has_sqlite_header(&path) {
            return Err(SourceError::NotAnArchive(path));
        }

        info!(path = %path.display(), "Opened tile archive");

        Ok(Self {
            source: path.display().to_string(),
            path,
            conn: None,
            metadata_cache: HashMap::new(),
            zoom_cache: HashMap::new(),
            loaded: LoadedTileSet::new(),
            progress: ProgressHandle::default(),
            cancel: CancelFlag::new(),
        })
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&mut self) -> Result<&Connection, SourceError> {
        if self.conn.is_none() {
            let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            debug!(path = %self.path.display(), "Connected to tile archive");
            self.conn = Some(conn);
        }

        match &self.conn {
            Some(conn) => Ok(conn),
            None => Err(SourceError::Config("archive connection unavailable".to_string())),
        }
    }

    /// Looks up a key of the `metadata` table.
    ///
    /// Failures are logged and read as "absent". Results are cached.
    pub fn metadata_value(&mut self, name: &str) -> Option<String> {
        if let Some(cached) = self.metadata_cache.get(name) {
            return cached.clone();
        }

        let value = match self.query_metadata(name) {
            Ok(value) => value,
            Err(e) => {
                error!(key = name, error = %e, "Metadata lookup failed");
                None
            }
        };

        self.metadata_cache.insert(name.to_string(), value.clone());
        value
    }

    fn query_metadata(&mut self, name: &str) -> Result<Option<String>, SourceError> {
        let sql = "SELECT value FROM metadata WHERE name = ?1";
        debug!(sql, key = name, "Querying archive");

        let value = self
            .connection()?
            .query_row(sql, [name], |row| row.get::<_, Option<String>>(0))
            .optional()?;

        Ok(value.flatten())
    }

    /// Zoom from metadata, else the matching aggregate over the tiles table.
    fn zoom_with_fallback(&mut self, key: &'static str, aggregate: &str) -> Option<u8> {
        if let Some(cached) = self.zoom_cache.get(key) {
            return *cached;
        }

        let from_metadata = self
            .metadata_value(key)
            .and_then(|v| v.trim().parse::<u8>().ok());

        let zoom = match from_metadata {
            Some(zoom) => Some(zoom),
            None => match self.query_zoom_aggregate(aggregate) {
                Ok(zoom) => zoom,
                Err(e) => {
                    error!(key, error = %e, "Zoom lookup failed");
                    None
                }
            },
        };

        self.zoom_cache.insert(key, zoom);
        zoom
    }

    fn query_zoom_aggregate(&mut self, aggregate: &str) -> Result<Option<u8>, SourceError> {
        let sql = format!("SELECT {}(zoom_level) FROM tiles", aggregate);
        debug!(sql = %sql, "Querying archive");

        let zoom: Option<i64> = self.connection()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(zoom.and_then(|z| u8::try_from(z).ok()))
    }

    fn query_tiles(&mut self, request: &LoadRequest) -> Result<Vec<TileRow>, SourceError> {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(zoom) = request.zoom {
            clauses.push("zoom_level = ?");
            params.push(Value::Integer(zoom as i64));
        }

        if let Some(range) = request.range {
            clauses.push("tile_column BETWEEN ? AND ?");
            params.push(Value::Integer(range.min_col as i64));
            params.push(Value::Integer(range.max_col as i64));
            clauses.push("tile_row BETWEEN ? AND ?");
            params.push(Value::Integer(range.min_row as i64));
            params.push(Value::Integer(range.max_row as i64));
        }

        let mut sql =
            String::from("SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(max_tiles) = request.max_tiles {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::try_from(max_tiles).unwrap_or(i64::MAX)));
        }

        debug!(sql = %sql, params = ?params, "Querying archive");

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, i64>("zoom_level")?,
                row.get::<_, i64>("tile_column")?,
                row.get::<_, i64>("tile_row")?,
                row.get::<_, Option<Vec<u8>>>("tile_data")?,
            ))
        })?;

        let mut tiles = Vec::new();
        for row in rows {
            let (zoom, col, tile_row, data) = row?;
            match (
                u8::try_from(zoom),
                u32::try_from(col),
                u32::try_from(tile_row),
            ) {
                (Ok(zoom), Ok(col), Ok(row)) => tiles.push(TileRow {
                    zoom,
                    col,
                    row,
                    data: data.unwrap_or_default(),
                }),
                _ => warn!(zoom, col, row = tile_row, "Skipping tile row with invalid address"),
            }
        }

        Ok(tiles)
    }
}

impl TileSource for ArchiveTileSource {
    fn source(&self) -> &str {
        &self.source
    }

    fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.clone())
    }

    fn min_zoom(&mut self) -> Option<u8> {
        self.zoom_with_fallback("minzoom", "MIN")
    }

    fn max_zoom(&mut self) -> Option<u8> {
        self.zoom_with_fallback("maxzoom", "MAX")
    }

    fn mask_level(&mut self) -> Option<String> {
        self.metadata_value("maskLevel")
    }

    fn scheme(&mut self) -> TileScheme {
        match self.metadata_value("scheme") {
            Some(value) if !value.trim().is_empty() => value.parse().unwrap_or_else(|e| {
                warn!(scheme = %value, error = %e, "Unknown scheme, assuming tms");
                TileScheme::Tms
            }),
            _ => TileScheme::Tms,
        }
    }

    fn load_tiles(&mut self, request: &LoadRequest, for_each: Option<&dyn Fn()>) -> TileBatch {
        self.cancel.reset();
        let mut batch = TileBatch::default();

        if let Err(e) = request.validate() {
            error!(source = %self.source, error = %e, "Rejected load request");
            batch.error = Some(e.into());
            return batch;
        }

        let scheme = self.scheme();
        let rows = match self.query_tiles(request) {
            Ok(rows) => rows,
            Err(e) => {
                error!(source = %self.source, error = %e, "Tile query failed");
                batch.error = Some(e);
                return batch;
            }
        };

        let total = rows.len();
        self.progress
            .start(format!("Reading {} tiles from archive...", total), total);

        for (index, row) in rows.into_iter().enumerate() {
            if let Some(callback) = for_each {
                callback();
            }

            if self.cancel.is_cancelled() {
                info!(delivered = batch.tiles.len(), "Archive load cancelled");
                batch.cancelled = true;
                break;
            }

            let coord = TileCoord::new(row.zoom, row.col, row.row, scheme);
            if self.loaded.insert(coord) {
                batch.tiles.push(RawTile {
                    coord,
                    payload: row.data,
                });
            } else {
                trace!(tile = %coord, "Skipping already loaded tile");
                batch.skipped_duplicates += 1;
            }

            self.progress.advance(index + 1);
        }

        debug!(
            delivered = batch.tiles.len(),
            duplicates = batch.skipped_duplicates,
            "Archive load finished"
        );
        batch
    }

    fn sample_payload(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let sql = "SELECT tile_data FROM tiles LIMIT 1";
        debug!(sql, "Querying archive");

        let payload = self
            .connection()?
            .query_row(sql, [], |row| row.get::<_, Option<Vec<u8>>>(0))
            .optional()?;

        Ok(payload.flatten())
    }

    fn set_progress_handler(&mut self, handler: ProgressCallback) {
        self.progress.set(handler);
    }

    fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn loaded_tiles(&self) -> &LoadedTileSet {
        &self.loaded
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => debug!(path = %self.path.display(), "Closed tile archive"),
                Err((_, e)) => {
                    warn!(path = %self.path.display(), error = %e, "Error closing tile archive")
                }
            }
        }
    }
}

impl Drop for ArchiveTileSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Checks the 16-byte SQLite file header.
fn has_sqlite_header(path: &Path) -> bool {
    let mut header = [0u8; 16];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => &header == SQLITE_HEADER,
        Err(_) => false,
    }
}

//! Core coordinate types.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;
/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;
/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;
/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;
/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;
/// Maximum zoom level accepted for vector tiles.
pub const MAX_ZOOM: u8 = 24;

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("Invalid latitude: {0} (must be between {MIN_LAT} and {MAX_LAT})")]
    InvalidLatitude(f64),

    /// Longitude outside -180..180.
    #[error("Invalid longitude: {0} (must be between {MIN_LON} and {MAX_LON})")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (must be between {MIN_ZOOM} and {MAX_ZOOM})")]
    InvalidZoom(u8),

    /// Unknown tile row scheme.
    #[error("Unknown tile scheme '{0}' (expected 'xyz' or 'tms')")]
    InvalidScheme(String),
}

/// Row numbering convention of a tile source.
///
/// - `Xyz`: row 0 is the northernmost row (slippy map / TileJSON default)
/// - `Tms`: row 0 is the southernmost row (MBTiles default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileScheme {
    Xyz,
    #[default]
    Tms,
}

impl TileScheme {
    /// Returns the scheme name as used in metadata tables and TileJSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileScheme::Xyz => "xyz",
            TileScheme::Tms => "tms",
        }
    }
}

impl fmt::Display for TileScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileScheme {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xyz" => Ok(TileScheme::Xyz),
            "tms" => Ok(TileScheme::Tms),
            other => Err(CoordError::InvalidScheme(other.to_string())),
        }
    }
}

/// Flips a row between the XYZ and TMS conventions at the given zoom.
///
/// The conversion is its own inverse.
#[inline]
pub fn flip_row(row: u32, zoom: u8) -> u32 {
    last_index(zoom).saturating_sub(row)
}

/// Highest column or row index at `zoom`, saturating at `u32::MAX`.
#[inline]
fn last_index(zoom: u8) -> u32 {
    if zoom >= 32 {
        u32::MAX
    } else {
        ((1u64 << zoom) - 1) as u32
    }
}

/// Identity of a single tile.
///
/// The row is stored exactly as the source delivered it; `scheme` records how
/// it must be read. Two coordinates are equal only when all four fields match;
/// compare across schemes with [`TileCoord::with_scheme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u8,
    /// Tile column (X, west to east)
    pub col: u32,
    /// Tile row, interpreted according to `scheme`
    pub row: u32,
    /// Row numbering convention
    pub scheme: TileScheme,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub fn new(zoom: u8, col: u32, row: u32, scheme: TileScheme) -> Self {
        Self {
            zoom,
            col,
            row,
            scheme,
        }
    }

    /// Returns the row counted from the south (TMS convention).
    #[inline]
    pub fn tms_row(&self) -> u32 {
        match self.scheme {
            TileScheme::Tms => self.row,
            TileScheme::Xyz => flip_row(self.row, self.zoom),
        }
    }

    /// Returns the row counted from the north (XYZ convention).
    #[inline]
    pub fn xyz_row(&self) -> u32 {
        match self.scheme {
            TileScheme::Xyz => self.row,
            TileScheme::Tms => flip_row(self.row, self.zoom),
        }
    }

    /// Re-expresses this tile in another row convention.
    pub fn with_scheme(&self, scheme: TileScheme) -> Self {
        let row = match scheme {
            TileScheme::Tms => self.tms_row(),
            TileScheme::Xyz => self.xyz_row(),
        };
        Self::new(self.zoom, self.col, row, scheme)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{} ({})", self.zoom, self.col, self.row, self.scheme)
    }
}

/// Rectangular block of tiles at one zoom level, inclusive on both ends.
///
/// Rows are in whatever scheme the owning source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl TileRange {
    /// Builds a range from two opposite corners given as `(col, row)`.
    ///
    /// The corners may be passed in any order.
    pub fn from_corners(a: (u32, u32), b: (u32, u32)) -> Self {
        Self {
            min_col: a.0.min(b.0),
            max_col: a.0.max(b.0),
            min_row: a.1.min(b.1),
            max_row: a.1.max(b.1),
        }
    }

    /// The full tile grid at `zoom`.
    pub fn full(zoom: u8) -> Self {
        let last = last_index(zoom);
        Self::from_corners((0, 0), (last, last))
    }

    /// Number of tiles in the range, saturating at `u64::MAX`.
    pub fn len(&self) -> u64 {
        let cols = u64::from(self.max_col - self.min_col) + 1;
        let rows = u64::from(self.max_row - self.min_row) + 1;
        cols.saturating_mul(rows)
    }

    /// A range always holds at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `(col, row)` lies inside the range.
    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.min_col..=self.max_col).contains(&col) && (self.min_row..=self.max_row).contains(&row)
    }

    /// Iterates `(col, row)` pairs column by column.
    pub fn iter(&self) -> TileRangeIter {
        TileRangeIter {
            range: *self,
            col: self.min_col as u64,
            row: self.min_row as u64,
        }
    }
}

impl IntoIterator for TileRange {
    type Item = (u32, u32);
    type IntoIter = TileRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the tiles of a [`TileRange`].
///
/// Yields columns west to east; within each column rows ascend.
#[derive(Debug, Clone)]
pub struct TileRangeIter {
    range: TileRange,
    col: u64,
    row: u64,
}

impl Iterator for TileRangeIter {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.col > self.range.max_col as u64 {
            return None;
        }

        let item = (self.col as u32, self.row as u32);

        self.row += 1;
        if self.row > self.range.max_row as u64 {
            self.row = self.range.min_row as u64;
            self.col += 1;
        }

        Some(item)
    }
}

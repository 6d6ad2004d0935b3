//! Coordinate conversion module
//!
//! Provides tile identities, conversions from geographic coordinates to tile
//! columns/rows, and the reprojection of tile-local vector tile coordinates
//! into spherical (Web) Mercator meters (EPSG:3857).

mod types;

pub use types::{
    flip_row, CoordError, TileCoord, TileRange, TileRangeIter, TileScheme, MAX_LAT, MAX_LON,
    MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;
use std::str::FromStr;

/// Equatorial radius of the WGS84 ellipsoid in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the Mercator world square in meters.
///
/// The world spans `-ORIGIN_SHIFT..ORIGIN_SHIFT` on both axes.
pub const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;

/// Default number of local units per tile axis in a vector tile.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Converts geographic coordinates to an XYZ tile coordinate.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let last = n - 1.0;

    // lon == 180 and lat == MIN_LAT land exactly on the far edge
    let col = ((lon + 180.0) / 360.0 * n).min(last) as u32;

    let lat_rad = lat * PI / 180.0;
    let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).clamp(0.0, last) as u32;

    Ok(TileCoord::new(zoom, col, row, TileScheme::Xyz))
}

/// Converts a geographic bounding box to the tile range covering it.
///
/// Rows of the returned range use `scheme`.
pub fn bbox_to_tile_range(
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    zoom: u8,
    scheme: TileScheme,
) -> Result<TileRange, CoordError> {
    let north_west = to_tile_coords(north, west, zoom)?.with_scheme(scheme);
    let south_east = to_tile_coords(south, east, zoom)?.with_scheme(scheme);

    Ok(TileRange::from_corners(
        (north_west.col, north_west.row),
        (south_east.col, south_east.row),
    ))
}

/// Mercator bounding box of a tile in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MercatorBounds {
    /// Width of the box in meters.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the box in meters.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Computes the Mercator bounds of a tile.
///
/// Tile size halves with every zoom level starting from the full world square
/// at zoom 0. Rows are counted from the south, whatever the tile's scheme.
#[inline]
pub fn tile_bounds(tile: &TileCoord) -> MercatorBounds {
    let size = 2.0 * ORIGIN_SHIFT / 2.0_f64.powi(tile.zoom as i32);
    let col = tile.col as f64;
    let row = tile.tms_row() as f64;

    MercatorBounds {
        min_x: col * size - ORIGIN_SHIFT,
        min_y: row * size - ORIGIN_SHIFT,
        max_x: (col + 1.0) * size - ORIGIN_SHIFT,
        max_y: (row + 1.0) * size - ORIGIN_SHIFT,
    }
}

/// How reprojected meters are rounded before they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatePrecision {
    /// Drop the fractional part (toward zero).
    #[default]
    Truncate,
    /// Round to the nearest meter.
    Round,
    /// Keep full floating point precision.
    Exact,
}

impl CoordinatePrecision {
    #[inline]
    fn apply(&self, value: f64) -> f64 {
        match self {
            CoordinatePrecision::Truncate => value.trunc(),
            CoordinatePrecision::Round => value.round(),
            CoordinatePrecision::Exact => value,
        }
    }

    /// Returns the configuration name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatePrecision::Truncate => "truncate",
            CoordinatePrecision::Round => "round",
            CoordinatePrecision::Exact => "exact",
        }
    }
}

impl FromStr for CoordinatePrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "truncate" => Ok(CoordinatePrecision::Truncate),
            "round" => Ok(CoordinatePrecision::Round),
            "exact" => Ok(CoordinatePrecision::Exact),
            other => Err(format!("unknown precision '{}'", other)),
        }
    }
}

/// Maps tile-local coordinates into Mercator meters.
///
/// Holds only the extent and precision policy, so one instance can be shared
/// freely between threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojector {
    extent: u32,
    precision: CoordinatePrecision,
}

impl Default for Reprojector {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENT, CoordinatePrecision::default())
    }
}

impl Reprojector {
    /// Creates a reprojector for tiles with `extent` local units per axis.
    ///
    /// An extent of zero is treated as [`DEFAULT_EXTENT`].
    pub fn new(extent: u32, precision: CoordinatePrecision) -> Self {
        let extent = if extent == 0 { DEFAULT_EXTENT } else { extent };
        Self { extent, precision }
    }

    /// Local units per tile axis.
    pub fn extent(&self) -> u32 {
        self.extent
    }

    /// Rounding policy applied to every output value.
    pub fn precision(&self) -> CoordinatePrecision {
        self.precision
    }

    /// Reprojects one local coordinate pair of `tile` into Mercator meters.
    #[inline]
    pub fn reproject(&self, local: [i64; 2], tile: &TileCoord) -> [f64; 2] {
        self.reproject_in(local, &tile_bounds(tile))
    }

    /// Reprojects against precomputed tile bounds.
    #[inline]
    pub fn reproject_in(&self, local: [i64; 2], bounds: &MercatorBounds) -> [f64; 2] {
        self.reproject_scaled(local, bounds, self.extent)
    }

    /// Reprojects a coordinate of a layer declaring its own `extent`.
    ///
    /// An extent of zero falls back to the reprojector's extent.
    #[inline]
    pub fn reproject_scaled(
        &self,
        local: [i64; 2],
        bounds: &MercatorBounds,
        extent: u32,
    ) -> [f64; 2] {
        let extent = if extent == 0 { self.extent } else { extent } as f64;
        let x = bounds.min_x + bounds.width() / extent * local[0] as f64;
        let y = bounds.min_y + bounds.height() / extent * local[1] as f64;
        [self.precision.apply(x), self.precision.apply(y)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = to_tile_coords(40.7128, -74.0060, 16).unwrap();
        assert_eq!(tile.row, 24640);
        assert_eq!(tile.col, 19295);
        assert_eq!(tile.zoom, 16);
        assert_eq!(tile.scheme, TileScheme::Xyz);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_coords(90.0, 0.0, 10);
        assert!(matches!(
            result.unwrap_err(),
            CoordError::InvalidLatitude(_)
        ));
    }

    #[test]
    fn test_invalid_zoom() {
        let result = to_tile_coords(0.0, 0.0, MAX_ZOOM + 1);
        assert_eq!(result.unwrap_err(), CoordError::InvalidZoom(MAX_ZOOM + 1));
    }

    #[test]
    fn test_far_edges_stay_inside_grid() {
        let tile = to_tile_coords(MIN_LAT, 180.0, 3).unwrap();
        assert_eq!(tile.col, 7);
        assert_eq!(tile.row, 7);
    }

    #[test]
    fn test_flip_row_is_involution() {
        assert_eq!(flip_row(0, 14), 16383);
        assert_eq!(flip_row(flip_row(1234, 14), 14), 1234);
        assert_eq!(flip_row(0, 0), 0);
    }

    #[test]
    fn test_coord_equality_includes_scheme() {
        let tms = TileCoord::new(3, 2, 1, TileScheme::Tms);
        let xyz = TileCoord::new(3, 2, 6, TileScheme::Xyz);
        assert_ne!(tms, xyz);
        assert_ne!(tms, TileCoord::new(3, 2, 1, TileScheme::Xyz));

        // Same tile once both sides use one convention
        assert_eq!(xyz.with_scheme(TileScheme::Tms), tms);
        assert_eq!(tms.tms_row(), xyz.tms_row());

        let mut set = std::collections::HashSet::new();
        set.insert(tms);
        assert!(!set.contains(&xyz));
    }

    #[test]
    fn test_full_range_saturates_at_high_zoom() {
        let range = TileRange::full(64);
        assert_eq!(range.max_col, u32::MAX);
        assert_eq!(range.max_row, u32::MAX);
        assert_eq!(TileRange::full(31).max_col, (1u32 << 31) - 1);
        assert_eq!(flip_row(5, 64), u32::MAX - 5);
        assert_eq!(flip_row(0, 255), u32::MAX);
    }

    #[test]
    fn test_full_width_range_len() {
        let row = TileRange::from_corners((0, 0), (u32::MAX, 0));
        assert_eq!(row.len(), 1u64 << 32);

        let all = TileRange::from_corners((0, 0), (u32::MAX, u32::MAX));
        assert_eq!(all.len(), u64::MAX);
        assert_eq!(TileRange::full(24).len(), 1u64 << 48);
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("TMS".parse::<TileScheme>().unwrap(), TileScheme::Tms);
        assert_eq!(" xyz ".parse::<TileScheme>().unwrap(), TileScheme::Xyz);
        assert!("google".parse::<TileScheme>().is_err());
    }

    #[test]
    fn test_world_tile_bounds() {
        let bounds = tile_bounds(&TileCoord::new(0, 0, 0, TileScheme::Tms));
        assert_eq!(bounds.min_x, -ORIGIN_SHIFT);
        assert_eq!(bounds.min_y, -ORIGIN_SHIFT);
        assert_eq!(bounds.max_x, ORIGIN_SHIFT);
        assert_eq!(bounds.max_y, ORIGIN_SHIFT);
    }

    #[test]
    fn test_tms_row_zero_is_southern() {
        let south = tile_bounds(&TileCoord::new(1, 0, 0, TileScheme::Tms));
        assert_eq!(south.min_y, -ORIGIN_SHIFT);
        assert_eq!(south.max_y, 0.0);

        let same = tile_bounds(&TileCoord::new(1, 0, 1, TileScheme::Xyz));
        assert_eq!(south, same);
    }

    #[test]
    fn test_reproject_world_corners() {
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);
        let reprojector = Reprojector::default();
        let e = DEFAULT_EXTENT as i64;
        let edge = ORIGIN_SHIFT.trunc();

        assert_eq!(reprojector.reproject([0, 0], &tile), [-edge, -edge]);
        assert_eq!(reprojector.reproject([e, 0], &tile), [edge, -edge]);
        assert_eq!(reprojector.reproject([0, e], &tile), [-edge, edge]);
        assert_eq!(reprojector.reproject([e, e], &tile), [edge, edge]);
    }

    #[test]
    fn test_reproject_truncates_not_rounds() {
        let tile = TileCoord::new(0, 0, 0, TileScheme::Tms);
        let truncating = Reprojector::default();
        let rounding = Reprojector::new(DEFAULT_EXTENT, CoordinatePrecision::Round);
        let exact = Reprojector::new(DEFAULT_EXTENT, CoordinatePrecision::Exact);

        // 20037508.34 stays 20037508 for both, but -x.34 truncates toward zero
        let [tx, _] = truncating.reproject([1, 0], &tile);
        let [rx, _] = rounding.reproject([1, 0], &tile);
        let [ex, _] = exact.reproject([1, 0], &tile);
        assert_eq!(tx, ex.trunc());
        assert_eq!(rx, ex.round());
        assert!(ex.fract() != 0.0);
    }

    #[test]
    fn test_reproject_scaled_uses_layer_extent() {
        let bounds = tile_bounds(&TileCoord::new(0, 0, 0, TileScheme::Tms));
        let reprojector = Reprojector::default();
        let edge = ORIGIN_SHIFT.trunc();

        assert_eq!(reprojector.reproject_scaled([512, 512], &bounds, 512), [edge, edge]);
        assert_eq!(reprojector.reproject_scaled([4096, 0], &bounds, 8192), [0.0, -edge]);
        assert_eq!(
            reprojector.reproject_scaled([4096, 4096], &bounds, 0),
            reprojector.reproject_in([4096, 4096], &bounds)
        );
    }

    #[test]
    fn test_reproject_zero_extent_falls_back() {
        assert_eq!(Reprojector::new(0, CoordinatePrecision::Exact).extent(), 4096);
    }

    #[test]
    fn test_precision_parsing() {
        assert_eq!(
            "Round".parse::<CoordinatePrecision>().unwrap(),
            CoordinatePrecision::Round
        );
        assert!("ceil".parse::<CoordinatePrecision>().is_err());
    }

    #[test]
    fn test_bbox_to_tile_range_tms() {
        // Whole world at zoom 1 covers all four tiles in either scheme
        let range =
            bbox_to_tile_range(-180.0, MIN_LAT, 180.0, MAX_LAT, 1, TileScheme::Tms).unwrap();
        assert_eq!(range, TileRange::full(1));
    }

    #[test]
    fn test_bbox_to_tile_range_single_tile() {
        // Zurich at zoom 14
        let xyz = bbox_to_tile_range(8.54, 47.37, 8.541, 47.371, 14, TileScheme::Xyz).unwrap();
        let tms = bbox_to_tile_range(8.54, 47.37, 8.541, 47.371, 14, TileScheme::Tms).unwrap();
        assert_eq!(xyz.len(), 1);
        assert_eq!(tms.min_row, flip_row(xyz.min_row, 14));
        assert_eq!(tms.min_col, xyz.min_col);
    }

    // Tile range tests
    #[test]
    fn test_range_normalizes_corners() {
        let a = TileRange::from_corners((5, 1), (2, 4));
        let b = TileRange::from_corners((2, 4), (5, 1));
        assert_eq!(a, b);
        assert_eq!(a.min_col, 2);
        assert_eq!(a.max_row, 4);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_range_iteration_order() {
        let range = TileRange::from_corners((0, 0), (1, 1));
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_full_range_at_zoom_zero() {
        let tiles: Vec<_> = TileRange::full(0).into_iter().collect();
        assert_eq!(tiles, vec![(0, 0)]);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_tile_coords_in_bounds(
                lat in -85.05..85.05_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=18
            ) {
                let tile = to_tile_coords(lat, lon, zoom)?;

                let max_tile = 2u32.pow(zoom as u32);
                prop_assert!(tile.row < max_tile);
                prop_assert!(tile.col < max_tile);
                prop_assert_eq!(tile.zoom, zoom);
            }

            #[test]
            fn test_reprojected_points_stay_inside_tile(
                zoom in 0u8..=16,
                col_raw in 0u32..65536,
                row_raw in 0u32..65536,
                x in 0i64..=4096,
                y in 0i64..=4096
            ) {
                let n = 2u32.pow(zoom as u32);
                let tile = TileCoord::new(zoom, col_raw % n, row_raw % n, TileScheme::Tms);
                let bounds = tile_bounds(&tile);
                let reprojector = Reprojector::new(4096, CoordinatePrecision::Exact);

                let [wx, wy] = reprojector.reproject([x, y], &tile);
                let eps = 1e-6;
                prop_assert!(wx >= bounds.min_x - eps && wx <= bounds.max_x + eps);
                prop_assert!(wy >= bounds.min_y - eps && wy <= bounds.max_y + eps);
            }

            #[test]
            fn test_reprojection_monotonic_in_x(
                zoom in 0u8..=14,
                x1 in 0i64..2048,
                x2 in 2048i64..4096,
                y in 0i64..4096
            ) {
                let tile = TileCoord::new(zoom, 0, 0, TileScheme::Tms);
                let reprojector = Reprojector::new(4096, CoordinatePrecision::Exact);

                let [a, _] = reprojector.reproject([x1, y], &tile);
                let [b, _] = reprojector.reproject([x2, y], &tile);
                prop_assert!(a < b);
            }

            #[test]
            fn test_scheme_conversion_roundtrip(
                zoom in 0u8..=20,
                row_raw in 0u32..1_048_576,
                col in 0u32..1000
            ) {
                let row = row_raw % 2u32.pow(zoom as u32);
                let tms = TileCoord::new(zoom, col, row, TileScheme::Tms);
                let xyz = tms.with_scheme(TileScheme::Xyz);

                prop_assert_eq!(xyz, tms);
                prop_assert_eq!(xyz.with_scheme(TileScheme::Tms).row, row);
                prop_assert_eq!(tile_bounds(&xyz), tile_bounds(&tms));
            }

            #[test]
            fn test_range_iterator_yields_len(
                c0 in 0u32..50, c1 in 0u32..50,
                r0 in 0u32..50, r1 in 0u32..50
            ) {
                let range = TileRange::from_corners((c0, r0), (c1, r1));
                let tiles: Vec<_> = range.iter().collect();

                prop_assert_eq!(tiles.len() as u64, range.len());
                for (col, row) in tiles {
                    prop_assert!(range.contains(col, row));
                }
            }
        }
    }
}

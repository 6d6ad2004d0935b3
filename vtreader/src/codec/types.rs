//! Decoded tile content.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Geometry type tag of a vector tile feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomType {
    Point,
    LineString,
    Polygon,
}

impl GeomType {
    /// Returns the GeoJSON name of the single-part geometry.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeomType::Point => "Point",
            GeomType::LineString => "LineString",
            GeomType::Polygon => "Polygon",
        }
    }
}

impl TryFrom<i32> for GeomType {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GeomType::Point),
            2 => Ok(GeomType::LineString),
            3 => Ok(GeomType::Polygon),
            _ => Err(value),
        }
    }
}

impl fmt::Display for GeomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered sequence of coordinate pairs.
pub type Ring<T> = Vec<[T; 2]>;

/// Coordinate tree of a feature.
///
/// The nesting mirrors the decoded vector tile:
/// - `Point`: one ring holding every point of the feature
/// - `LineString`: one ring per line
/// - `Polygon`: one entry per polygon, each an exterior ring followed by holes
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry<T> {
    Point(Ring<T>),
    LineString(Vec<Ring<T>>),
    Polygon(Vec<Vec<Ring<T>>>),
}

impl<T: Copy> Geometry<T> {
    /// Returns the geometry type tag.
    pub fn geom_type(&self) -> GeomType {
        match self {
            Geometry::Point(_) => GeomType::Point,
            Geometry::LineString(_) => GeomType::LineString,
            Geometry::Polygon(_) => GeomType::Polygon,
        }
    }

    /// Applies `f` to every coordinate pair, depth first, preserving structure.
    pub fn map_coords<U, F>(&self, mut f: F) -> Geometry<U>
    where
        F: FnMut([T; 2]) -> [U; 2],
    {
        let mut map_ring = |ring: &Ring<T>| ring.iter().map(|c| f(*c)).collect::<Ring<U>>();

        match self {
            Geometry::Point(points) => Geometry::Point(map_ring(points)),
            Geometry::LineString(lines) => {
                Geometry::LineString(lines.iter().map(&mut map_ring).collect())
            }
            Geometry::Polygon(polygons) => Geometry::Polygon(
                polygons
                    .iter()
                    .map(|rings| rings.iter().map(&mut map_ring).collect())
                    .collect(),
            ),
        }
    }

    /// Total number of coordinate pairs.
    pub fn coord_count(&self) -> usize {
        match self {
            Geometry::Point(points) => points.len(),
            Geometry::LineString(lines) => lines.iter().map(Vec::len).sum(),
            Geometry::Polygon(polygons) => polygons.iter().flatten().map(Vec::len).sum(),
        }
    }

    /// Returns true if the geometry holds no coordinates.
    pub fn is_empty(&self) -> bool {
        self.coord_count() == 0
    }
}

/// Scalar feature property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    UInt(u64),
    Double(f64),
    Bool(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::UInt(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Feature properties keyed by name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A feature as stored in the tile, in tile-local integer coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    pub id: Option<u64>,
    pub geometry: Geometry<i64>,
    pub properties: Properties,
}

impl RawFeature {
    /// Creates a feature without id.
    pub fn new(geometry: Geometry<i64>, properties: Properties) -> Self {
        Self {
            id: None,
            geometry,
            properties,
        }
    }

    /// Geometry type of this feature.
    pub fn geom_type(&self) -> GeomType {
        self.geometry.geom_type()
    }
}

/// One named layer of a decoded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLayer {
    pub name: String,
    /// Local units per tile axis declared by the layer.
    pub extent: u32,
    pub features: Vec<RawFeature>,
}

/// All layers of one tile, in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTile {
    pub layers: Vec<DecodedLayer>,
}

impl DecodedTile {
    /// Looks up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&DecodedLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Total number of features over all layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }

    /// Returns true if the tile holds no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

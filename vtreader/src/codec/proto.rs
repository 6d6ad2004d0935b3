//! Protobuf messages of the Mapbox vector tile schema (version 2.1).
//!
//! See <https://github.com/mapbox/vector-tile-spec/tree/master/2.1>.
//! The messages are declared by hand so no build script or `protoc` is needed.

use prost::Message;

/// Vector tile data.
#[derive(Clone, PartialEq, Message)]
pub struct Tile {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<Layer>,
}

/// Tile layer.
#[derive(Clone, PartialEq, Message)]
pub struct Layer {
    /// Vector tile format version used by this layer.
    #[prost(uint32, optional, tag = "15")]
    pub version: Option<u32>,
    /// Unique layer identifier.
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<Feature>,
    /// Tag keys referenced by the layer's features.
    #[prost(string, repeated, tag = "3")]
    pub keys: Vec<String>,
    /// Tag values referenced by the layer's features.
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<Value>,
    /// Width and height of the layer's coordinate system.
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
}

/// Layer feature.
#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    /// Consecutive pairs of indices into [`Layer::keys`] and [`Layer::values`].
    #[prost(uint32, repeated, tag = "2")]
    pub tags: Vec<u32>,
    /// Geometry type: 0 unknown, 1 point, 2 linestring, 3 polygon.
    #[prost(int32, optional, tag = "3")]
    pub r#type: Option<i32>,
    /// Stream of geometry commands and zig-zag encoded parameters.
    #[prost(uint32, repeated, tag = "4")]
    pub geometry: Vec<u32>,
}

/// Feature tag value. Exactly one field is set in a valid message.
#[derive(Clone, PartialEq, Message)]
pub struct Value {
    #[prost(string, optional, tag = "1")]
    pub string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    pub int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    pub uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    pub sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    pub bool_value: Option<bool>,
}

/// Parses an uncompressed tile.
pub fn parse_tile(bytes: &[u8]) -> Result<Tile, prost::DecodeError> {
    Tile::decode(bytes)
}

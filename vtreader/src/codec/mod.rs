//! Vector tile codec.
//!
//! Turns the raw payload delivered by a tile source into structured layers:
//!
//! 1. Decompress. Payloads are gzip, zlib or raw deflate streams; the
//!    container is detected from the leading bytes.
//! 2. Parse the protobuf message ([`proto`]).
//! 3. Resolve feature tags into property maps and decode geometry command
//!    streams into coordinate trees ([`geometry`]).
//!
//! This is the only place that understands the wire format. Malformed input
//! fails with a [`DecodeError`]; the caller decides whether to skip the tile.

mod geometry;
pub mod proto;
mod types;

pub use geometry::{decode_geometry, YAxis};
pub use types::{
    DecodedLayer, DecodedTile, GeomType, Geometry, Properties, PropertyValue, RawFeature, Ring,
};

use std::io::{self, Read};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use thiserror::Error;
use tracing::{debug, trace};

use crate::coord::DEFAULT_EXTENT;

/// Magic bytes opening a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors raised while decoding a tile payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not a readable gzip/zlib/deflate stream.
    #[error("Decompression failed: {0}")]
    Compression(#[source] io::Error),

    /// The decompressed bytes do not match the vector tile schema.
    #[error("Invalid vector tile protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// A feature references missing tags or carries a broken command stream.
    #[error("Malformed feature in layer '{layer}': {reason}")]
    Geometry { layer: String, reason: String },
}

/// Compression container of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zlib,
    Deflate,
}

impl Compression {
    /// Detects the container from the payload's leading bytes.
    ///
    /// Anything without a gzip or zlib header is assumed to be raw deflate.
    pub fn detect(payload: &[u8]) -> Self {
        if payload.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        match payload {
            [cmf, flg, ..] if is_zlib_header(*cmf, *flg) => Compression::Zlib,
            _ => Compression::Deflate,
        }
    }
}

/// Deflate method nibble plus the header checksum from RFC 1950.
fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    cmf & 0x0f == 8 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

/// Decompresses a tile payload.
pub fn decompress(payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Compression(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty payload",
        )));
    }

    let mut out = Vec::with_capacity(payload.len() * 4);
    let result = match Compression::detect(payload) {
        Compression::Gzip => GzDecoder::new(payload).read_to_end(&mut out),
        Compression::Zlib => ZlibDecoder::new(payload).read_to_end(&mut out),
        Compression::Deflate => DeflateDecoder::new(payload).read_to_end(&mut out),
    };
    result.map_err(DecodeError::Compression)?;

    Ok(out)
}

/// Decoder for compressed vector tile payloads.
#[derive(Debug, Clone, Copy)]
pub struct TileCodec {
    y_axis: YAxis,
    default_extent: u32,
}

impl Default for TileCodec {
    fn default() -> Self {
        Self::new(YAxis::default())
    }
}

impl TileCodec {
    /// Creates a codec with the given local y orientation.
    pub fn new(y_axis: YAxis) -> Self {
        Self {
            y_axis,
            default_extent: DEFAULT_EXTENT,
        }
    }

    /// Sets the extent assumed for layers that do not declare one.
    ///
    /// Zero keeps [`DEFAULT_EXTENT`].
    pub fn with_default_extent(mut self, extent: u32) -> Self {
        if extent > 0 {
            self.default_extent = extent;
        }
        self
    }

    /// Local y orientation of decoded coordinates.
    pub fn y_axis(&self) -> YAxis {
        self.y_axis
    }

    /// Extent used for layers without an `extent` field.
    pub fn default_extent(&self) -> u32 {
        self.default_extent
    }

    /// Decompresses and decodes one tile payload.
    pub fn decode(&self, payload: &[u8]) -> Result<DecodedTile, DecodeError> {
        let bytes = decompress(payload)?;
        self.decode_uncompressed(&bytes)
    }

    /// Decodes an already decompressed protobuf tile.
    pub fn decode_uncompressed(&self, bytes: &[u8]) -> Result<DecodedTile, DecodeError> {
        let tile = proto::parse_tile(bytes)?;

        let layers = tile
            .layers
            .into_iter()
            .map(|layer| self.decode_layer(layer))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DecodedTile { layers })
    }

    fn decode_layer(&self, layer: proto::Layer) -> Result<DecodedLayer, DecodeError> {
        let extent = match layer.extent {
            Some(e) if e > 0 => e,
            _ => self.default_extent,
        };
        let malformed = |reason: String| DecodeError::Geometry {
            layer: layer.name.clone(),
            reason,
        };

        let mut features = Vec::with_capacity(layer.features.len());
        for (index, feature) in layer.features.iter().enumerate() {
            let geom_type = match feature.r#type.map(GeomType::try_from) {
                Some(Ok(t)) => t,
                other => {
                    debug!(
                        layer = %layer.name,
                        index,
                        geom_type = ?other,
                        "Skipping feature with unsupported geometry type"
                    );
                    continue;
                }
            };

            let properties = resolve_tags(&layer, &feature.tags).map_err(&malformed)?;
            let geometry = decode_geometry(geom_type, &feature.geometry, extent, self.y_axis)
                .map_err(|reason| malformed(format!("feature {}: {}", index, reason)))?;

            if geometry.is_empty() {
                trace!(layer = %layer.name, index, "Skipping feature without coordinates");
                continue;
            }

            features.push(RawFeature {
                id: feature.id,
                geometry,
                properties,
            });
        }

        Ok(DecodedLayer {
            name: layer.name,
            extent,
            features,
        })
    }
}

fn resolve_tags(layer: &proto::Layer, tags: &[u32]) -> Result<Properties, String> {
    if tags.len() % 2 != 0 {
        return Err(format!("odd number of tag indices ({})", tags.len()));
    }

    let mut properties = Properties::new();
    for pair in tags.chunks_exact(2) {
        let key = layer
            .keys
            .get(pair[0] as usize)
            .ok_or_else(|| format!("tag key index {} out of range", pair[0]))?;
        let value = layer
            .values
            .get(pair[1] as usize)
            .ok_or_else(|| format!("tag value index {} out of range", pair[1]))?;

        if let Some(value) = convert_value(value) {
            properties.insert(key.clone(), value);
        }
    }

    Ok(properties)
}

fn convert_value(value: &proto::Value) -> Option<PropertyValue> {
    if let Some(s) = &value.string_value {
        Some(PropertyValue::String(s.clone()))
    } else if let Some(v) = value.float_value {
        Some(PropertyValue::Double(v as f64))
    } else if let Some(v) = value.double_value {
        Some(PropertyValue::Double(v))
    } else if let Some(v) = value.int_value {
        Some(PropertyValue::Int(v))
    } else if let Some(v) = value.uint_value {
        Some(PropertyValue::UInt(v))
    } else if let Some(v) = value.sint_value {
        Some(PropertyValue::Int(v))
    } else {
        value.bool_value.map(PropertyValue::Bool)
    }
}

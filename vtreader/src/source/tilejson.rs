//! TileJSON descriptor of a remote tile set.

use serde::Deserialize;
use tracing::{debug, warn};

use super::SourceError;
use crate::coord::TileScheme;
use crate::http::HttpClient;

/// The subset of a TileJSON document used to fetch vector tiles.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TileJson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub minzoom: Option<u8>,
    #[serde(default)]
    pub maxzoom: Option<u8>,
    #[serde(default, rename = "maskLevel")]
    pub mask_level: Option<serde_json::Value>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub tiles: Vec<String>,
}

impl TileJson {
    /// Fetches and parses the descriptor at `url`.
    pub fn load<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Self, SourceError> {
        debug!(url, "Loading TileJSON descriptor");

        let bytes = client.get(url).map_err(|e| SourceError::Descriptor {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Self::from_slice(&bytes).map_err(|reason| SourceError::Descriptor {
            url: url.to_string(),
            reason,
        })
    }

    /// Parses a descriptor from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| format!("invalid TileJSON: {}", e))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn min_zoom(&self) -> Option<u8> {
        self.minzoom
    }

    pub fn max_zoom(&self) -> Option<u8> {
        self.maxzoom
    }

    /// Mask level rendered as a string, whatever its JSON type.
    pub fn mask_level(&self) -> Option<String> {
        match &self.mask_level {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Row scheme; TileJSON defaults to `xyz`.
    pub fn scheme(&self) -> TileScheme {
        match self.scheme.as_deref() {
            None | Some("") => TileScheme::Xyz,
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!(scheme = value, error = %e, "Unknown scheme, assuming xyz");
                TileScheme::Xyz
            }),
        }
    }

    pub fn tiles(&self) -> &[String] {
        &self.tiles
    }

    /// The URL template used for fetching (the first listed).
    pub fn tile_template(&self) -> Option<&str> {
        self.tiles.first().map(String::as_str)
    }
}

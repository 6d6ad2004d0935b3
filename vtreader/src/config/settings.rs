//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;

use crate::codec::{TileCodec, YAxis};
use crate::coord::{CoordinatePrecision, Reprojector, DEFAULT_EXTENT};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::source::DEFAULT_PAGE_SIZE;

/// Default GeoJSON output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "geojson";

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "vtreader.log";

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Concurrent fetches per page for remote sources.
    pub page_size: usize,
    /// Cap on tiles per run.
    pub max_tiles: Option<usize>,
    /// HTTP timeout in seconds.
    pub timeout: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_tiles: None,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// `[codec]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecSettings {
    pub y_axis: YAxis,
}

impl CodecSettings {
    pub fn codec(&self) -> TileCodec {
        TileCodec::new(self.y_axis)
    }
}

/// `[reproject]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReprojectSettings {
    /// Local units per tile axis.
    pub extent: u32,
    pub precision: CoordinatePrecision,
}

impl Default for ReprojectSettings {
    fn default() -> Self {
        Self {
            extent: DEFAULT_EXTENT,
            precision: CoordinatePrecision::default(),
        }
    }
}

impl ReprojectSettings {
    pub fn reprojector(&self) -> Reprojector {
        Reprojector::new(self.extent, self.precision)
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub directory: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".").join(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: super::config_directory().join(DEFAULT_LOG_FILE),
        }
    }
}

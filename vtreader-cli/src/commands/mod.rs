//! CLI command implementations.
//!
//! - [`convert`] - Convert a tile source into GeoJSON collections
//! - [`info`] - Show tile set metadata
//! - [`config`] - Configuration management (path, show)

pub mod common;
pub mod config;
pub mod convert;
pub mod info;

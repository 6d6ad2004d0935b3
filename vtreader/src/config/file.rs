//! Configuration file loading and saving.

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::{
    CodecSettings, LoggingSettings, OutputSettings, ReprojectSettings, SourceSettings,
};
use crate::codec::YAxis;

/// Errors raised while reading or writing `config.ini`.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The INI file could not be read or parsed
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// The INI file could not be written
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// A key holds a value outside its allowed set
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// Effective vtreader settings, one field per INI section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub codec: CodecSettings,
    pub reproject: ReprojectSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads `~/.vtreader/config.ini`.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads settings from `path`, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Writes the settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, self.to_config_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Renders the effective configuration as INI text.
    pub fn to_config_string(&self) -> String {
        let mut ini = Ini::new();

        ini.with_section(Some("source"))
            .set("page_size", self.source.page_size.to_string())
            .set(
                "max_tiles",
                self.source
                    .max_tiles
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
            )
            .set("timeout", self.source.timeout.to_string());

        let y_axis = match self.codec.y_axis {
            YAxis::Up => "up",
            YAxis::Down => "down",
        };
        ini.with_section(Some("codec")).set("y_axis", y_axis);

        ini.with_section(Some("reproject"))
            .set("extent", self.reproject.extent.to_string())
            .set("precision", self.reproject.precision.as_str());

        ini.with_section(Some("output"))
            .set("directory", self.output.directory.display().to_string());

        ini.with_section(Some("logging"))
            .set("file", self.logging.file.display().to_string());

        let mut buf = Vec::new();
        if ini.write_to(&mut buf).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Directory holding the config file and the default log (`~/.vtreader`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vtreader")
}

/// Location of `config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.source.page_size = 3;
        config.source.max_tiles = Some(50);
        config.codec.y_axis = YAxis::Down;
        config.output.directory = PathBuf::from("/tmp/geojson");

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_paths() {
        assert!(config_directory().ends_with(".vtreader"));
        assert!(config_file_path().ends_with(".vtreader/config.ini"));
    }

    #[test]
    fn test_config_string_mentions_every_section() {
        let text = ConfigFile::default().to_config_string();
        for section in ["[source]", "[codec]", "[reproject]", "[output]", "[logging]"] {
            assert!(text.contains(section), "missing {}", section);
        }
    }
}

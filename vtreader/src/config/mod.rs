//! Configuration file handling for `~/.vtreader/config.ini`.
//!
//! Settings structs live in [`settings`], INI parsing in [`parser`] and file
//! loading/saving in [`file`].

mod file;
mod parser;
mod settings;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use settings::{
    CodecSettings, LoggingSettings, OutputSettings, ReprojectSettings, SourceSettings,
    DEFAULT_LOG_FILE, DEFAULT_OUTPUT_DIR,
};

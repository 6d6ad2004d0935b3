//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use vtreader::config::ConfigFileError;
use vtreader::coord::CoordError;
use vtreader::pipeline::PipelineError;
use vtreader::source::SourceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to open the tile source
    Source(SourceError),
    /// Invalid coordinates or zoom
    Coord(CoordError),
    /// Conversion failed
    Pipeline(PipelineError),
    /// Failed to prepare the output directory
    Output { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Source(SourceError::NotAnArchive(_)) => {
                eprintln!();
                eprintln!("The source must be an MBTiles file or an http(s) TileJSON URL.");
            }
            CliError::Pipeline(PipelineError::NotVectorTiles(_)) => {
                eprintln!();
                eprintln!("The tile set may hold raster tiles.");
                eprintln!("Use --no-format-check to force a run.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Source(e) => write!(f, "Failed to open tile source: {}", e),
            CliError::Coord(e) => write!(f, "{}", e),
            CliError::Pipeline(e) => write!(f, "Conversion failed: {}", e),
            CliError::Output { path, error } => {
                write!(
                    f,
                    "Failed to prepare output directory '{}': {}",
                    path.display(),
                    error
                )
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Source(e) => Some(e),
            CliError::Coord(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::Output { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Source(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coord(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = CliError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad value");

        let err = CliError::from(CoordError::InvalidZoom(30));
        assert!(err.to_string().starts_with("Invalid zoom level: 30"));
    }

    #[test]
    fn test_source_is_exposed() {
        use std::error::Error;

        let err = CliError::from(SourceError::Config("nope".to_string()));
        assert!(err.source().is_some());
        assert!(CliError::LoggingInit("x".to_string()).source().is_none());
    }
}

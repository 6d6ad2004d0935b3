//! Shared command setup: config, logging and source opening.

use crate::error::CliError;
use tracing::info;
use vtreader::config::ConfigFile;
use vtreader::logging::{init_logging, split_log_path, LoggingGuard};
use vtreader::source::{open_source, TileSource};

/// Per-command context holding the loaded config and the log guard.
pub struct CliRunner {
    /// Flushes the file log when dropped
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads the config and starts logging, at debug level if requested.
    ///
    /// Console logging is only enabled when stdout is not a terminal, so log
    /// lines never tear through the progress bar.
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let stdout_enabled = !atty::is(atty::Stream::Stdout);

        let logging_guard = init_logging(log_dir, &log_file, stdout_enabled, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Records the version and command in the log.
    pub fn log_startup(&self, command: &str) {
        info!("vtreader v{}", vtreader::VERSION);
        info!("vtreader CLI: {} command", command);
    }

    /// Open an archive or remote source, with an optional page size override.
    pub fn open_source(
        &self,
        input: &str,
        page_size: Option<usize>,
    ) -> Result<Box<dyn TileSource>, CliError> {
        let page_size = page_size.unwrap_or(self.config.source.page_size);
        let source = open_source(input, page_size, self.config.source.timeout)?;
        info!(source = input, name = %source.name(), "Opened tile source");
        Ok(source)
    }
}

//! `vtreader config` subcommands.

use clap::Subcommand;
use vtreader::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Prints the requested config detail.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = ConfigFile::load()?;
            print!("{}", config.to_config_string());
            Ok(())
        }
    }
}

//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show` for the INI file
//! read by every other command.

use std::path::Path;

use clap::Subcommand;
use tilemosaic::config::ConfigFile;

use crate::error::CliError;
use crate::runner::GlobalOptions;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file values over defaults)
    Show,
}

/// Run a config subcommand.
pub fn run(global: &GlobalOptions, command: ConfigCommands) -> Result<(), CliError> {
    let path = global.config_path();
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            print!("{}", global.load_config()?.to_ini_string());
            Ok(())
        }
    }
}

/// Write defaults to `path`, refusing to clobber an existing file.
fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

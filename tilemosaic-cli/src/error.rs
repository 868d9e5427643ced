//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilemosaic::boundary::BoundaryError;
use tilemosaic::config::ConfigFileError;
use tilemosaic::pipeline::{ConfigError, PipelineError, RunFailure};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// Run parameters rejected
    InvalidParameters(ConfigError),
    /// Boundary file could not be resolved
    Boundary(BoundaryError),
    /// Mosaic run failed
    Run(RunFailure),
    /// Async runtime could not be started
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::InvalidParameters(ConfigError::MissingTemplate) => {
                eprintln!();
                eprintln!("Pass a tile source with --source, for example:");
                eprintln!("  --source 'https://tile.example.org/{{z}}/{{x}}/{{y}}.png'");
                eprintln!("or set [source] template in the configuration file.");
            }
            CliError::Boundary(BoundaryError::MissingProjection(_)) => {
                eprintln!();
                eprintln!("A shapefile needs its .prj file next to the .shp to know its");
                eprintln!("coordinate system.");
            }
            CliError::Run(failure) => {
                if let PipelineError::Resource { .. } = failure.error {
                    eprintln!();
                    eprintln!("Check that the output and scratch directories are writable.");
                }
                print_failed_tiles(&failure.report.failed_indices());
                print_scratch_left_behind(failure.report.scratch_left_behind.as_deref());
            }
            _ => {}
        }

        process::exit(1)
    }
}

/// Warns about a scratch directory the run could not remove.
pub fn print_scratch_left_behind(scratch: Option<&std::path::Path>) {
    if let Some(path) = scratch {
        eprintln!();
        eprintln!("Scratch directory could not be removed: {}", path.display());
    }
}

/// Lists failed tile indices on stderr.
pub fn print_failed_tiles(indices: &[tilemosaic::coord::TileIndex]) {
    if indices.is_empty() {
        return;
    }
    eprintln!();
    eprintln!("{} tile(s) failed:", indices.len());
    for index in indices {
        eprintln!("  {}", index);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::InvalidParameters(e) => write!(f, "Invalid parameters: {}", e),
            CliError::Boundary(e) => write!(f, "Boundary error: {}", e),
            CliError::Run(failure) => write!(f, "Mosaic run failed: {}", failure),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::InvalidParameters(e) => Some(e),
            CliError::Boundary(e) => Some(e),
            CliError::Run(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::InvalidParameters(e)
    }
}

impl From<BoundaryError> for CliError {
    fn from(e: BoundaryError) -> Self {
        CliError::Boundary(e)
    }
}

impl From<RunFailure> for CliError {
    fn from(e: RunFailure) -> Self {
        CliError::Run(e)
    }
}

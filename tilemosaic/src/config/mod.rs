//! Configuration for tilemosaic.
//!
//! Two layers:
//!
//! - [`ConfigFile`]: the user's `~/.tilemosaic/config.ini`, loaded with
//!   defaults for anything missing.
//! - [`DownloadConfig`]: the HTTP and worker-pool parameters handed to the
//!   pipeline.
//!
//! # Example
//!
//! ```no_run
//! use tilemosaic::config::{ConfigFile, DownloadConfig};
//!
//! let file = ConfigFile::load()?;
//! let download = DownloadConfig::from(&file.download);
//! # Ok::<(), tilemosaic::config::ConfigFileError>(())
//! ```

mod defaults;
mod download;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use download::DownloadConfig;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BoundarySettings, ConfigFile, DownloadSettings, LoggingSettings, OutputSettings,
    SourceSettings,
};

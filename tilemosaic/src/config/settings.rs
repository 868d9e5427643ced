//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::mosaic::Compression;
use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Tile source settings
    pub source: SourceSettings,
    /// Download settings
    pub download: DownloadSettings,
    /// Output settings
    pub output: OutputSettings,
    /// Boundary file handling
    pub boundary: BoundarySettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Tile source configuration.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Template with `{x}`, `{y}`, `{z}` placeholders. Validated when the
    /// pipeline is configured, not at load time.
    pub template: Option<String>,
}

/// Download configuration.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Zoom level (0-23)
    pub zoom: u8,
    /// Tiles processed concurrently
    pub concurrency: usize,
    /// Per-request HTTP timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Retry attempts after the first failure
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub retry_base_delay_ms: u64,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Output configuration.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// Directory receiving the mosaic (created if missing)
    pub directory: PathBuf,
    /// Mosaic file name
    pub name: String,
    /// GeoTIFF compression
    pub compression: Compression,
    /// Parent of the per-run scratch directory. `None` uses the system
    /// temp directory.
    pub scratch_dir: Option<PathBuf>,
}

/// Boundary file configuration.
#[derive(Debug, Clone)]
pub struct BoundarySettings {
    /// Write the reprojected boundary as GeoJSON next to the mosaic
    pub persist_reprojected: bool,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

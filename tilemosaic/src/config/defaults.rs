//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the accepted ranges enforced by the
//! parser, and the `ConfigFile::default()` implementation.

use std::path::PathBuf;

use super::settings::*;
use crate::mosaic::Compression;
use crate::provider::DEFAULT_USER_AGENT;

// =============================================================================
// Download
// =============================================================================

/// Default zoom level when none is given.
pub const DEFAULT_ZOOM: u8 = 15;

/// Default number of tiles processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Upper bound on concurrent tile workers.
pub const MAX_CONCURRENCY: usize = 256;

/// Default per-request HTTP timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default retry attempts after the first failed request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff between retries.
/// Actual delay = base * 2^(attempt - 1), e.g. 250ms, 500ms, 1s.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;

// =============================================================================
// Output
// =============================================================================

/// Default mosaic file name inside the output directory.
pub const DEFAULT_OUTPUT_NAME: &str = "out.tif";

/// Default output compression.
pub const DEFAULT_COMPRESSION: Compression = Compression::Deflate;

/// Log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "tilemosaic.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            source: SourceSettings { template: None },
            download: DownloadSettings {
                zoom: DEFAULT_ZOOM,
                concurrency: DEFAULT_CONCURRENCY,
                request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
                max_retries: DEFAULT_MAX_RETRIES,
                retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            output: OutputSettings {
                directory: PathBuf::from("."),
                name: DEFAULT_OUTPUT_NAME.to_string(),
                compression: DEFAULT_COMPRESSION,
                scratch_dir: None,
            },
            boundary: BoundarySettings {
                persist_reprojected: false,
            },
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}

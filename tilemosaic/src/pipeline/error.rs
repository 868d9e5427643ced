//! Error types for the mosaic pipeline.
//!
//! Errors are categorized by how far they reach: a [`TileError`] is recorded
//! against one tile and the run carries on, everything under
//! [`PipelineError`] ends the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::boundary::BoundaryError;
use crate::coord::{CoordError, TileIndex};
use crate::mosaic::AssemblyError;
use crate::provider::{ProviderError, TemplateError};

/// Invalid run parameters, detected before any I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Bounding box or zoom rejected by the coordinate layer
    #[error("invalid extent: {0}")]
    Extent(#[from] CoordError),

    /// Tile source template rejected
    #[error("invalid tile source: {0}")]
    Template(#[from] TemplateError),

    /// No tile source configured
    #[error("no tile source template configured")]
    MissingTemplate,

    /// Zoom level above the supported maximum
    #[error("zoom level {0} is not supported (maximum {})", crate::coord::MAX_ZOOM)]
    InvalidZoom(u8),

    /// Worker pool size out of range
    #[error("concurrency must be between 1 and {max}, got {value}")]
    InvalidConcurrency { value: usize, max: usize },

    /// Request timeout of zero
    #[error("request timeout must be greater than zero")]
    InvalidTimeout,

    /// Output file name empty or containing a path separator
    #[error("invalid output file name '{0}'")]
    InvalidOutputName(String),

    /// HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    HttpClient(ProviderError),
}

/// Failure of a single tile. Recorded in the run report, never fatal.
#[derive(Debug, Error)]
pub enum TileError {
    /// Remote fetch failed after all attempts
    #[error("fetch of tile {index} failed after {attempts} attempt(s): {source}")]
    Fetch {
        index: TileIndex,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Local template rendered a path that does not exist
    #[error("local tile {index} not found at {}", .path.display())]
    MissingLocalFile { index: TileIndex, path: PathBuf },

    /// Decoding or GeoTIFF encoding failed
    #[error("georeferencing tile {index} failed: {message}")]
    Georeference { index: TileIndex, message: String },

    /// Scratch file I/O failed
    #[error("I/O error for tile {index}: {source}")]
    Io {
        index: TileIndex,
        #[source]
        source: std::io::Error,
    },
}

impl TileError {
    /// The tile this error belongs to.
    pub fn index(&self) -> TileIndex {
        match self {
            TileError::Fetch { index, .. }
            | TileError::MissingLocalFile { index, .. }
            | TileError::Georeference { index, .. }
            | TileError::Io { index, .. } => *index,
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Scratch or output directory could not be prepared
    #[error("cannot prepare {}: {source}", .path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Boundary file could not be resolved to an extent
    #[error("boundary extent: {0}")]
    Boundary(#[from] BoundaryError),

    /// Mosaic could not be produced
    #[error("mosaic assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    /// Cancellation was requested
    #[error("run cancelled")]
    Cancelled,

    /// A worker task panicked or was lost
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile() -> TileIndex {
        TileIndex::new(842, 388, 10).unwrap()
    }

    #[test]
    fn test_tile_error_reports_its_index() {
        let err = TileError::MissingLocalFile {
            index: tile(),
            path: PathBuf::from("/tiles/10/842/388.png"),
        };
        assert_eq!(err.index(), tile());
        assert_eq!(
            err.to_string(),
            "local tile x=842 y=388 z=10 not found at /tiles/10/842/388.png"
        );
    }

    #[test]
    fn test_fetch_error_keeps_source() {
        let err = TileError::Fetch {
            index: tile(),
            attempts: 4,
            source: ProviderError::HttpStatus {
                status: 503,
                url: "http://t/10/842/388".to_string(),
            },
        };
        assert!(err.to_string().contains("after 4 attempt(s)"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_converts_into_pipeline_error() {
        let err: PipelineError = ConfigError::MissingTemplate.into();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.to_string(), "no tile source template configured");
    }
}

//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tilemosaic::boundary::ExtentSource;
use tilemosaic::coord::GeoBoundingBox;
use tilemosaic::mosaic::Compression;

use crate::error::CliError;

/// Extent selection: exactly one of `--bbox` or `--boundary`.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct ExtentArgs {
    /// Bounding box as lon_min,lat_min,lon_max,lat_max in EPSG:4326
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<GeoBoundingBox>,

    /// Polygon boundary file (GeoJSON, or Shapefile with a .prj)
    #[arg(long)]
    pub boundary: Option<PathBuf>,
}

impl ExtentArgs {
    /// Convert to the pipeline's extent source.
    pub fn to_source(&self) -> Result<ExtentSource, CliError> {
        match (&self.bbox, &self.boundary) {
            (Some(bbox), None) => Ok(ExtentSource::BoundingBox(*bbox)),
            (None, Some(path)) => Ok(ExtentSource::Boundary { path: path.clone() }),
            _ => Err(CliError::Config(
                "Exactly one of --bbox or --boundary is required".to_string(),
            )),
        }
    }
}

/// Parse `lon_min,lat_min,lon_max,lat_max`.
pub fn parse_bbox(s: &str) -> Result<GeoBoundingBox, String> {
    let values = s
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [lon_min, lat_min, lon_max, lat_max] => {
            GeoBoundingBox::new(*lon_min, *lat_min, *lon_max, *lat_max).map_err(|e| e.to_string())
        }
        _ => Err(format!(
            "expected 4 comma-separated values (lon_min,lat_min,lon_max,lat_max), got {}",
            values.len()
        )),
    }
}

/// GeoTIFF compression selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum CompressionArg {
    /// No compression
    None,
    /// LZW
    Lzw,
    /// Deflate (zlib)
    Deflate,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Compression::None,
            CompressionArg::Lzw => Compression::Lzw,
            CompressionArg::Deflate => Compression::Deflate,
        }
    }
}

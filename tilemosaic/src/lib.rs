//! tilemosaic - slippy-map tiles to a single GeoTIFF
//!
//! This library downloads raster map tiles from a tile service or a local
//! tile cache, georeferences each tile in EPSG:4326 and stitches them into
//! one seamless mosaic covering a requested extent.
//!
//! # High-Level API
//!
//! The [`pipeline`] module runs the whole process:
//!
//! ```ignore
//! use tilemosaic::boundary::ExtentSource;
//! use tilemosaic::pipeline::{MosaicPipeline, PipelineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PipelineConfig::builder()
//!     .template("https://tile.example.org/{z}/{x}/{y}.png")
//!     .zoom(15)
//!     .build()?;
//! let pipeline = MosaicPipeline::new(config)?;
//!
//! let extent = ExtentSource::Boundary { path: "area.geojson".into() };
//! let summary = pipeline.run(extent, CancellationToken::new()).await?;
//! ```
//!
//! The stages are usable on their own: [`coord`] and [`plan`] for tile
//! arithmetic, [`boundary`] for polygon extents, [`provider`] for fetching,
//! [`georef`] for tagging and [`mosaic`] for assembly.

pub mod boundary;
pub mod config;
pub mod coord;
pub mod georef;
pub mod logging;
pub mod mosaic;
pub mod pipeline;
pub mod plan;
pub mod provider;

/// Version of the tilemosaic library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Mosaic pipeline orchestration.
//!
//! One run turns an extent into a GeoTIFF mosaic:
//!
//! ```text
//! ExtentSource -> plan_range -> [fetch -> georeference] x N -> assemble -> cleanup
//! ```
//!
//! # Key Components
//!
//! - [`PipelineConfig`] - validated run parameters
//! - [`RunContext`] - scratch and output paths owned by one run
//! - [`MosaicPipeline`] - runs the phases and publishes [`RunState`] changes
//! - [`RunReport`] - per-tile outcome, returned with the result
//!
//! # Example
//!
//! ```ignore
//! use tilemosaic::boundary::ExtentSource;
//! use tilemosaic::coord::GeoBoundingBox;
//! use tilemosaic::pipeline::{MosaicPipeline, PipelineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PipelineConfig::builder()
//!     .template("https://tile.example.org/{z}/{x}/{y}.png")
//!     .zoom(10)
//!     .build()?;
//! let pipeline = MosaicPipeline::new(config)?;
//!
//! let bbox = GeoBoundingBox::new(116.3, 39.9, 116.5, 40.0)?;
//! let summary = pipeline
//!     .run(ExtentSource::BoundingBox(bbox), CancellationToken::new())
//!     .await?;
//! println!("wrote {}", summary.output_path.display());
//! ```

mod config;
mod context;
mod error;
mod report;
mod runner;
mod state;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use context::RunContext;
pub use error::{ConfigError, PipelineError, TileError};
pub use report::{RunReport, TileFailure};
pub use runner::{MosaicPipeline, RunFailure, RunSummary};
pub use state::RunState;

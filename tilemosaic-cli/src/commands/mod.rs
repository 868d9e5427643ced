//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`download`] - Fetch an extent and write the GeoTIFF mosaic
//! - [`extent`] - Resolve a boundary file to an EPSG:4326 extent
//! - [`plan`] - Show the tile range for an extent without downloading

pub mod common;
pub mod config;
pub mod download;
pub mod extent;
pub mod plan;

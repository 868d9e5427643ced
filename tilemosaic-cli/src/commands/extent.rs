//! Extent command - resolve a boundary file to an EPSG:4326 bounding box.

use std::path::{Path, PathBuf};

use clap::Args;
use tilemosaic::boundary::{BoundaryLayer, SpatialRef};

use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};

/// Arguments for the extent command.
#[derive(Debug, Clone, Args)]
pub struct ExtentCommandArgs {
    /// Polygon boundary file (GeoJSON, or Shapefile with a .prj)
    pub path: PathBuf,

    /// Also write the reprojected boundary as GeoJSON into this directory
    #[arg(long)]
    pub save_to: Option<PathBuf>,
}

/// Run the extent command.
pub fn run(global: &GlobalOptions, args: ExtentCommandArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("extent");

    for line in describe(&args.path, args.save_to.as_deref())? {
        println!("{}", line);
    }
    Ok(())
}

/// Reads, reprojects and summarises a boundary file.
fn describe(path: &Path, save_to: Option<&Path>) -> Result<Vec<String>, CliError> {
    let layer = BoundaryLayer::read(path)?;
    let wgs84 = layer.reproject(&SpatialRef::wgs84())?;
    let bbox = wgs84.extent()?;

    let mut lines = vec![
        format!("File:     {}", path.display()),
        format!("Native:   {}", layer.srs()),
        format!(
            "Polygons: {} ({} vertices)",
            layer.polygon_count(),
            layer.vertex_count()
        ),
        format!("Extent:   {}", bbox),
        format!(
            "Bbox:     {},{},{},{}",
            bbox.lon_min, bbox.lat_min, bbox.lon_max, bbox.lat_max
        ),
    ];

    if let Some(dir) = save_to {
        let written = wgs84.write_geojson(dir)?;
        lines.push(format!("Saved:    {}", written.display()));
    }

    Ok(lines)
}

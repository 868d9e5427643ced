//! Plan command - show which tiles a download would fetch.

use clap::Args;
use tilemosaic::coord::MAX_ZOOM;
use tilemosaic::pipeline::ConfigError;
use tilemosaic::plan::{plan_range, TileRange};

use super::common::ExtentArgs;
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};

/// Arguments for the plan command.
#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub extent: ExtentArgs,

    /// Zoom level (0-23); defaults to the configured zoom
    #[arg(long)]
    pub zoom: Option<u8>,
}

/// Run the plan command.
pub fn run(global: &GlobalOptions, args: PlanArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("plan");

    let zoom = args.zoom.unwrap_or(runner.config().download.zoom);
    if zoom > MAX_ZOOM {
        return Err(ConfigError::InvalidZoom(zoom).into());
    }

    let bbox = args.extent.to_source()?.resolve(None)?;
    let range = plan_range(&bbox, zoom).map_err(ConfigError::from)?;

    println!("Extent: {}", bbox);
    for line in describe(&range) {
        println!("{}", line);
    }

    Ok(())
}

/// Human-readable lines describing a tile range.
fn describe(range: &TileRange) -> Vec<String> {
    vec![
        format!("Zoom:   {}", range.zoom()),
        format!("X:      {}..={}", range.x_min(), range.x_max()),
        format!("Y:      {}..={}", range.y_min(), range.y_max()),
        format!(
            "Tiles:  {} ({} x {})",
            range.len(),
            range.width(),
            range.height()
        ),
        format!(
            "Mosaic: {} x {} px",
            u64::from(range.width()) * 256,
            u64::from(range.height()) * 256
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemosaic::coord::GeoBoundingBox;

    #[test]
    fn test_describe_beijing_range() {
        let bbox = GeoBoundingBox::new(116.3, 39.9, 116.5, 40.0).unwrap();
        let range = plan_range(&bbox, 10).unwrap();

        let lines = describe(&range);

        assert_eq!(lines[1], "X:      842..=843");
        assert_eq!(lines[2], "Y:      387..=388");
        assert_eq!(lines[3], "Tiles:  4 (2 x 2)");
        assert_eq!(lines[4], "Mosaic: 512 x 512 px");
    }
}

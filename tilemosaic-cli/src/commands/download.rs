//! Download command - fetch every tile of an extent into one GeoTIFF.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use tilemosaic::config::ConfigFile;
use tilemosaic::pipeline::{MosaicPipeline, PipelineConfigBuilder, RunSummary};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{CompressionArg, ExtentArgs};
use crate::error::{print_failed_tiles, print_scratch_left_behind, CliError};
use crate::runner::{CliRunner, GlobalOptions};

/// Arguments for the download command.
#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub extent: ExtentArgs,

    /// Tile source template with {x}, {y}, {z}: an http(s) URL or a local path
    #[arg(long)]
    pub source: Option<String>,

    /// Zoom level (0-23)
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Directory receiving the mosaic
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Mosaic file name
    #[arg(long)]
    pub output_name: Option<String>,

    /// Tiles fetched concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Retry attempts per tile after the first failure
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Base delay for exponential backoff, in milliseconds
    #[arg(long)]
    pub retry_base_delay_ms: Option<u64>,

    /// User-Agent header sent to the tile server
    #[arg(long)]
    pub user_agent: Option<String>,

    /// GeoTIFF compression
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// Parent directory for the per-run scratch directory
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Save the reprojected boundary as GeoJSON in the output directory
    #[arg(long)]
    pub persist_reprojected: bool,
}

impl DownloadArgs {
    /// Overlay the flags that were given onto the loaded configuration.
    pub fn apply_to(&self, config: &mut ConfigFile) {
        if let Some(source) = &self.source {
            config.source.template = Some(source.clone());
        }
        if let Some(zoom) = self.zoom {
            config.download.zoom = zoom;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(name) = &self.output_name {
            config.output.name = name.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.download.concurrency = concurrency;
        }
        if let Some(timeout) = self.request_timeout_ms {
            config.download.request_timeout_ms = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.download.max_retries = retries;
        }
        if let Some(delay) = self.retry_base_delay_ms {
            config.download.retry_base_delay_ms = delay;
        }
        if let Some(agent) = &self.user_agent {
            config.download.user_agent = agent.clone();
        }
        if let Some(compression) = self.compression {
            config.output.compression = compression.into();
        }
        if let Some(dir) = &self.scratch_dir {
            config.output.scratch_dir = Some(dir.clone());
        }
        if self.persist_reprojected {
            config.boundary.persist_reprojected = true;
        }
    }
}

/// Run the download command.
pub fn run(global: &GlobalOptions, args: DownloadArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global)?;
    runner.log_startup("download");

    let mut config = runner.config().clone();
    args.apply_to(&mut config);

    let pipeline_config = PipelineConfigBuilder::from_config_file(&config).build()?;
    let extent = args.extent.to_source()?;

    println!("Source:  {}", pipeline_config.source());
    println!("Extent:  {}", extent);
    println!("Zoom:    {}", pipeline_config.zoom());
    println!("Output:  {}", pipeline_config.output_path().display());
    println!();

    let pipeline = MosaicPipeline::new(pipeline_config)?;
    let start = Instant::now();

    let result = runner.block_on(async move {
        let cancel = CancellationToken::new();
        let signal_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                signal_token.cancel();
            }
        });

        pipeline.run(extent, cancel).await
    })?;

    let summary = result?;
    print_summary(&summary, start.elapsed().as_secs_f64());

    Ok(())
}

fn print_summary(summary: &RunSummary, elapsed_secs: f64) {
    let report = &summary.report;
    let mosaic = &summary.mosaic;

    info!(
        path = %summary.output_path.display(),
        succeeded = report.tiles_succeeded,
        failed = report.tiles_failed.len(),
        "Download complete"
    );

    println!(
        "Mosaic written in {:.2}s: {}",
        elapsed_secs,
        summary.output_path.display()
    );
    println!("  Size:   {} x {} px", mosaic.width, mosaic.height);
    println!("  Bounds: {}", mosaic.bounds);
    println!(
        "  Tiles:  {}/{} succeeded",
        report.tiles_succeeded, report.tiles_requested
    );

    print_failed_tiles(&report.failed_indices());
    print_scratch_left_behind(report.scratch_left_behind.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tilemosaic::mosaic::Compression;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        args: DownloadArgs,
    }

    fn parse(extra: &[&str]) -> DownloadArgs {
        let mut argv = vec!["t", "--bbox", "116.3,39.9,116.5,40.0"];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_flags_override_config_file() {
        let args = parse(&[
            "--source",
            "https://tile.example.org/{z}/{x}/{y}.png",
            "--zoom",
            "10",
            "--concurrency",
            "4",
            "--compression",
            "lzw",
            "--output-name",
            "beijing.tif",
        ]);

        let mut config = ConfigFile::default();
        args.apply_to(&mut config);

        assert_eq!(
            config.source.template.as_deref(),
            Some("https://tile.example.org/{z}/{x}/{y}.png")
        );
        assert_eq!(config.download.zoom, 10);
        assert_eq!(config.download.concurrency, 4);
        assert_eq!(config.output.compression, Compression::Lzw);
        assert_eq!(config.output.name, "beijing.tif");
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let args = parse(&[]);

        let mut config = ConfigFile::default();
        config.source.template = Some("/tiles/{z}/{x}/{y}.png".to_string());
        config.download.max_retries = 7;
        args.apply_to(&mut config);

        assert_eq!(config.source.template.as_deref(), Some("/tiles/{z}/{x}/{y}.png"));
        assert_eq!(config.download.max_retries, 7);
        assert!(!config.boundary.persist_reprojected);
    }

    #[test]
    fn test_overridden_config_builds_pipeline_config() {
        let args = parse(&["--source", "/tiles/{z}/{x}/{y}.png", "--zoom", "12"]);

        let mut config = ConfigFile::default();
        args.apply_to(&mut config);
        let built = PipelineConfigBuilder::from_config_file(&config).build().unwrap();

        assert_eq!(built.zoom(), 12);
        assert!(!built.source().is_remote());
    }

    #[test]
    fn test_zero_concurrency_is_rejected_at_build() {
        let args = parse(&["--source", "/tiles/{z}/{x}/{y}.png", "--concurrency", "0"]);

        let mut config = ConfigFile::default();
        args.apply_to(&mut config);

        assert!(PipelineConfigBuilder::from_config_file(&config).build().is_err());
    }
}

//! Mosaic run orchestration.
//!
//! [`MosaicPipeline::run`] drives one run through its phases:
//!
//! 1. prepare the run's scratch and output directories
//! 2. resolve the extent and plan the tile range
//! 3. fetch and georeference every tile on a bounded worker pool
//! 4. assemble the georeferenced tiles into the output mosaic
//! 5. remove scratch, whatever happened before

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::boundary::ExtentSource;
use crate::coord::TileIndex;
use crate::georef::{georeference, GeoreferencedTile};
use crate::mosaic::{assemble_over, MosaicInfo};
use crate::plan::{plan_range, TileRange};
use crate::provider::{AsyncHttpClient, AsyncReqwestClient, TileFetcher};

use super::config::PipelineConfig;
use super::context::RunContext;
use super::error::{ConfigError, PipelineError, TileError};
use super::report::RunReport;
use super::state::RunState;

/// A finished run.
#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub output_path: PathBuf,
    pub mosaic: MosaicInfo,
}

/// A failed run, with whatever tile accounting happened before the failure.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: PipelineError,
    pub report: RunReport,
}

/// Downloads, georeferences and mosaics the tiles covering an extent.
///
/// State transitions are published on a watch channel; see
/// [`subscribe`](Self::subscribe). Runs are meant to be sequential: two
/// concurrent runs on the same pipeline share one state channel.
pub struct MosaicPipeline<C> {
    config: PipelineConfig,
    fetcher: Arc<TileFetcher<C>>,
    state_tx: watch::Sender<RunState>,
}

impl MosaicPipeline<AsyncReqwestClient> {
    /// Creates a pipeline with an HTTP client configured from `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let download = config.download();
        let client = AsyncReqwestClient::with_options(download.request_timeout(), download.user_agent())
            .map_err(ConfigError::HttpClient)?;
        Ok(Self::with_client(config, client))
    }
}

impl<C: AsyncHttpClient + 'static> MosaicPipeline<C> {
    /// Creates a pipeline around an existing HTTP client.
    pub fn with_client(config: PipelineConfig, client: C) -> Self {
        let fetcher = TileFetcher::new(config.source().clone(), client, config.download());
        let (state_tx, _) = watch::channel(RunState::Idle);

        Self {
            config,
            fetcher: Arc::new(fetcher),
            state_tx,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Receiver of run state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    /// Most recently published state.
    pub fn state(&self) -> RunState {
        *self.state_tx.borrow()
    }

    /// Executes one run over `extent`.
    ///
    /// Failed tiles do not fail the run; they are listed in the report and
    /// show up as no-data in the mosaic. The scratch directory is removed
    /// before this returns, on every path.
    pub async fn run(
        &self,
        extent: ExtentSource,
        cancel: CancellationToken,
    ) -> Result<RunSummary, RunFailure> {
        let context = RunContext::new(&self.config);
        let mut report = RunReport::default();

        info!(
            extent = %extent,
            zoom = self.config.zoom(),
            source = %self.fetcher.source(),
            output = %context.output_path().display(),
            "Starting mosaic run"
        );

        let result = self.execute(&context, extent, &cancel, &mut report).await;

        self.transition(RunState::CleaningUp);
        clean_scratch(&context, &mut report);

        match result {
            Ok(mosaic) => {
                self.transition(RunState::Done);
                if !report.tiles_failed.is_empty() {
                    warn!(
                        failed = report.tiles_failed.len(),
                        requested = report.tiles_requested,
                        "Mosaic has gaps where tiles failed"
                    );
                }
                info!(
                    output = %mosaic.path.display(),
                    width = mosaic.width,
                    height = mosaic.height,
                    tiles = report.tiles_succeeded,
                    "Mosaic written"
                );
                Ok(RunSummary {
                    output_path: mosaic.path.clone(),
                    report,
                    mosaic,
                })
            }
            Err(error) => {
                self.transition(RunState::Failed);
                error!(error = %error, "Mosaic run failed");
                Err(RunFailure { error, report })
            }
        }
    }

    async fn execute(
        &self,
        context: &RunContext,
        extent: ExtentSource,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Result<MosaicInfo, PipelineError> {
        self.transition(RunState::PreparingScratch);
        ensure_active(cancel)?;
        context.prepare()?;

        self.transition(RunState::Planning);
        let range = self.plan(context, extent).await?;
        *report = RunReport::new(range.len());
        info!(range = %range, tiles = range.len(), "Tile range planned");

        self.transition(RunState::Fetching { total: range.len() });
        let rasters = self.fetch_all(range, context.scratch(), cancel, report).await?;

        self.transition(RunState::Assembling);
        ensure_active(cancel)?;
        let output = context.output_path().to_path_buf();
        let compression = self.config.compression();
        let footprint = range.bounds();
        let mosaic = tokio::task::spawn_blocking(move || {
            assemble_over(&rasters, &footprint, &output, compression)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("assembly task failed: {}", e)))??;

        Ok(mosaic)
    }

    async fn plan(
        &self,
        context: &RunContext,
        extent: ExtentSource,
    ) -> Result<TileRange, PipelineError> {
        let persist_dir = self
            .config
            .persist_reprojected()
            .then(|| context.output_dir().to_path_buf());

        let bbox = tokio::task::spawn_blocking(move || extent.resolve(persist_dir.as_deref()))
            .await
            .map_err(|e| PipelineError::Internal(format!("extent task failed: {}", e)))??;

        let range = plan_range(&bbox, self.config.zoom()).map_err(ConfigError::from)?;
        Ok(range)
    }

    /// Fetches and georeferences every tile of `range`, at most
    /// `concurrency` at a time. Returns the rasters of the tiles that
    /// succeeded; failures go to `report`.
    async fn fetch_all(
        &self,
        range: TileRange,
        scratch: &Path,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let total = range.len();
        let permits = Arc::new(Semaphore::new(self.config.download().concurrency()));
        let mut pending = range.iter().peekable();
        let mut tasks: JoinSet<Result<GeoreferencedTile, TileError>> = JoinSet::new();
        let mut rasters = Vec::new();

        while pending.peek().is_some() || !tasks.is_empty() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(
                        completed = report.tiles_completed(),
                        in_flight = tasks.len(),
                        "Run cancelled - aborting tile tasks"
                    );
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(PipelineError::Cancelled);
                }

                joined = tasks.join_next(), if !tasks.is_empty() => {
                    let tile = match joined {
                        Some(Ok(result)) => result,
                        Some(Err(join_err)) => {
                            tasks.abort_all();
                            return Err(PipelineError::Internal(format!("tile task failed: {}", join_err)));
                        }
                        None => continue,
                    };

                    match tile {
                        Ok(tile) => {
                            report.record_success();
                            info!(
                                x = tile.index.x,
                                y = tile.index.y,
                                completed = report.tiles_completed(),
                                total,
                                "Tile ready"
                            );
                            rasters.push(tile.raster_path);
                        }
                        Err(e) => {
                            warn!(
                                x = e.index().x,
                                y = e.index().y,
                                z = e.index().z,
                                error = %e,
                                "Tile failed"
                            );
                            report.record_failure(e);
                            info!(completed = report.tiles_completed(), total, "Tile skipped");
                        }
                    }
                }

                permit = Arc::clone(&permits).acquire_owned(), if pending.peek().is_some() => {
                    let permit = permit
                        .map_err(|e| PipelineError::Internal(format!("worker pool closed: {}", e)))?;
                    if let Some(index) = pending.next() {
                        let fetcher = Arc::clone(&self.fetcher);
                        let scratch = scratch.to_path_buf();
                        tasks.spawn(async move {
                            let _permit = permit;
                            process_tile(&fetcher, index, scratch).await
                        });
                    }
                }
            }
        }

        debug!(
            succeeded = report.tiles_succeeded,
            failed = report.tiles_failed.len(),
            "All tiles processed"
        );

        rasters.sort();
        Ok(rasters)
    }

    fn transition(&self, state: RunState) {
        self.state_tx.send_replace(state);
        debug!(state = %state, "Run state changed");
    }
}

/// Fetch then georeference one tile. Georeferencing is CPU and disk bound
/// and runs on the blocking pool.
async fn process_tile<C: AsyncHttpClient>(
    fetcher: &TileFetcher<C>,
    index: TileIndex,
    scratch: PathBuf,
) -> Result<GeoreferencedTile, TileError> {
    let fetched = fetcher.fetch(index, &scratch).await?;

    tokio::task::spawn_blocking(move || georeference(&fetched, &scratch))
        .await
        .map_err(|e| TileError::Georeference {
            index,
            message: format!("georeference task failed: {}", e),
        })?
}

/// Removes the run's scratch directory. A failure does not change the
/// outcome of the run but is recorded in `report`.
fn clean_scratch(context: &RunContext, report: &mut RunReport) {
    if context.cleanup().is_err() {
        report.record_cleanup_failure(context.scratch().to_path_buf());
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloadConfig;
    use crate::coord::{tile_edges, GeoBoundingBox};
    use crate::georef::read_rgba;
    use crate::mosaic::AssemblyError;
    use crate::provider::{ProviderError, ScriptedHttpClient, SlowHttpClient};
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::{BufReader, Cursor};
    use std::time::Duration;
    use tempfile::TempDir;

    const TEMPLATE: &str = "https://tile.example.org/{z}/{x}/{y}.png";

    fn png(colour: [u8; 3]) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(256, 256, Rgb(colour))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn url(x: u32, y: u32) -> String {
        format!("https://tile.example.org/10/{}/{}.png", x, y)
    }

    /// Extent of the four z10 tiles 842..=843 x 387..=388.
    fn beijing() -> ExtentSource {
        ExtentSource::BoundingBox(GeoBoundingBox::new(116.3, 39.9, 116.5, 40.0).unwrap())
    }

    fn pipeline<C: AsyncHttpClient + 'static>(
        root: &TempDir,
        client: C,
        concurrency: usize,
    ) -> MosaicPipeline<C> {
        let config = PipelineConfig::builder()
            .template(TEMPLATE)
            .zoom(10)
            .output_dir(root.path().join("out"))
            .scratch_dir(Some(root.path().join("scratch")))
            .download(
                DownloadConfig::new()
                    .with_concurrency(concurrency)
                    .with_max_retries(0)
                    .with_retry_base_delay_ms(1),
            )
            .build()
            .unwrap();
        MosaicPipeline::with_client(config, client)
    }

    fn all_tiles_client() -> ScriptedHttpClient {
        let mut routes = HashMap::new();
        for x in 842..=843 {
            for y in 387..=388 {
                routes.insert(url(x, y), Ok(png([x as u8, y as u8, 7])));
            }
        }
        ScriptedHttpClient::with_routes(routes)
    }

    fn scratch_is_empty(root: &TempDir) -> bool {
        std::fs::read_dir(root.path().join("scratch"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_full_run_fetches_planned_range() {
        let root = TempDir::new().unwrap();
        let client = all_tiles_client();
        let pipeline = pipeline(&root, client.clone(), 2);

        let summary = pipeline.run(beijing(), CancellationToken::new()).await.unwrap();

        assert_eq!(summary.report.tiles_requested, 4);
        assert_eq!(summary.report.tiles_succeeded, 4);
        assert!(summary.report.is_complete());
        assert_eq!(client.calls(), 4);
        assert_eq!(summary.output_path, root.path().join("out").join("out.tif"));
        assert!(summary.output_path.is_file());
        assert_eq!((summary.mosaic.width, summary.mosaic.height), (512, 512));
        assert_eq!(pipeline.state(), RunState::Done);
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_single_failed_tile_leaves_a_gap() {
        let root = TempDir::new().unwrap();
        let mut routes = HashMap::new();
        for (x, y) in [(842, 387), (842, 388), (843, 387)] {
            routes.insert(url(x, y), Ok(png([200, 10, 10])));
        }
        routes.insert(
            url(843, 388),
            Err(ProviderError::HttpStatus {
                status: 404,
                url: url(843, 388),
            }),
        );
        let pipeline = pipeline(&root, ScriptedHttpClient::with_routes(routes), 4);

        let summary = pipeline.run(beijing(), CancellationToken::new()).await.unwrap();

        assert_eq!(summary.report.tiles_succeeded, 3);
        assert_eq!(
            summary.report.failed_indices(),
            vec![TileIndex::new(843, 388, 10).unwrap()]
        );

        // South-east quadrant is the missing tile
        let file = std::fs::File::open(&summary.output_path).unwrap();
        let (header, rgba) = read_rgba(BufReader::new(file)).unwrap();
        let gap = tile_edges(&TileIndex::new(843, 388, 10).unwrap());
        assert!((header.bounds.lon_max - gap.lon_max).abs() < 1e-6);
        let width = header.width as usize;
        let last = ((header.height as usize - 1) * width + width - 1) * 4;
        assert_eq!(&rgba[last..last + 4], &[0, 0, 0, 0]);
        assert_eq!(&rgba[..4], &[200, 10, 10, 255]);
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_no_successful_tiles_fails_without_output() {
        let root = TempDir::new().unwrap();
        let client = ScriptedHttpClient::new(vec![Err(ProviderError::HttpStatus {
            status: 404,
            url: "t".into(),
        })]);
        let pipeline = pipeline(&root, client, 2);
        let mut states = pipeline.subscribe();

        let failure = pipeline.run(beijing(), CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            failure.error,
            PipelineError::Assembly(AssemblyError::NoTiles)
        ));
        assert_eq!(failure.report.tiles_failed.len(), 4);
        assert!(!root.path().join("out").join("out.tif").exists());
        assert!(scratch_is_empty(&root));
        assert_eq!(*states.borrow_and_update(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let root = TempDir::new().unwrap();
        let client = all_tiles_client();
        let pipeline = pipeline(&root, client.clone(), 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = pipeline.run(beijing(), cancel).await.unwrap_err();

        assert!(matches!(failure.error, PipelineError::Cancelled));
        assert_eq!(client.calls(), 0);
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_invalid_boundary_is_fatal() {
        let root = TempDir::new().unwrap();
        let pipeline = pipeline(&root, all_tiles_client(), 2);
        let extent = ExtentSource::Boundary {
            path: root.path().join("missing.geojson"),
        };

        let failure = pipeline.run(extent, CancellationToken::new()).await.unwrap_err();

        assert!(matches!(failure.error, PipelineError::Boundary(_)));
        assert_eq!(failure.report.tiles_requested, 0);
        assert!(scratch_is_empty(&root));
    }

    /// Twelve z10 tiles: x 841..=844, y 386..=388.
    fn wide_extent() -> ExtentSource {
        ExtentSource::BoundingBox(GeoBoundingBox::new(116.0, 39.9, 117.0, 40.3).unwrap())
    }

    fn read_output(path: &Path) -> (crate::georef::GeoRasterHeader, Vec<u8>) {
        read_rgba(BufReader::new(std::fs::File::open(path).unwrap())).unwrap()
    }

    #[tokio::test]
    async fn test_failed_edge_tile_keeps_planned_footprint() {
        let root = TempDir::new().unwrap();
        let mut routes = HashMap::new();
        routes.insert(url(842, 387), Ok(png([30, 60, 90])));
        routes.insert(
            url(843, 387),
            Err(ProviderError::HttpStatus {
                status: 404,
                url: url(843, 387),
            }),
        );
        let pipeline = pipeline(&root, ScriptedHttpClient::with_routes(routes), 2);
        // One row, two columns: 842..=843 x 387
        let extent =
            ExtentSource::BoundingBox(GeoBoundingBox::new(116.3, 40.0, 116.5, 40.05).unwrap());

        let summary = pipeline.run(extent, CancellationToken::new()).await.unwrap();

        assert_eq!(summary.report.tiles_requested, 2);
        assert_eq!(summary.report.tiles_succeeded, 1);

        let east = tile_edges(&TileIndex::new(843, 387, 10).unwrap());
        let (header, rgba) = read_output(&summary.output_path);
        assert_eq!((header.width, header.height), (512, 256));
        assert!((header.bounds.lon_max - east.lon_max).abs() < 1e-9);

        let at = |col: usize, row: usize| {
            let offset = (row * 512 + col) * 4;
            [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]]
        };
        assert_eq!(at(10, 10), [30, 60, 90, 255]);
        assert_eq!(at(300, 10), [0, 0, 0, 0]);
        assert_eq!(at(511, 255), [0, 0, 0, 0]);
        assert!(scratch_is_empty(&root));
    }

    #[tokio::test]
    async fn test_fetches_never_exceed_concurrency() {
        let root = TempDir::new().unwrap();
        let client = SlowHttpClient::new(png([5, 5, 5]), Duration::from_millis(20));
        let pipeline = pipeline(&root, client.clone(), 3);

        let summary = pipeline
            .run(wide_extent(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.report.tiles_requested, 12);
        assert_eq!(summary.report.tiles_succeeded, 12);
        assert_eq!(client.calls(), 12);
        assert!(client.peak() <= 3, "peak in flight was {}", client.peak());
        assert!(client.peak() > 1, "fetches ran one at a time");
        assert_eq!(client.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_aborts_in_flight_fetches() {
        let root = TempDir::new().unwrap();
        let client = SlowHttpClient::new(png([5, 5, 5]), Duration::from_secs(30));
        let pipeline = pipeline(&root, client.clone(), 2);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let watcher = client.clone();
        tokio::spawn(async move {
            while watcher.in_flight() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            trigger.cancel();
        });

        let failure = tokio::time::timeout(Duration::from_secs(10), pipeline.run(wide_extent(), cancel))
            .await
            .expect("cancellation did not interrupt the run")
            .unwrap_err();

        assert!(matches!(failure.error, PipelineError::Cancelled));
        assert_eq!(failure.report.tiles_requested, 12);
        assert_eq!(failure.report.tiles_completed(), 0);
        assert_eq!(client.calls(), 2);
        assert_eq!(client.in_flight(), 0, "aborted fetches were dropped");
        assert_eq!(pipeline.state(), RunState::Failed);
        assert!(!root.path().join("out").join("out.tif").exists());
        assert!(scratch_is_empty(&root));
    }

    #[test]
    fn test_cleanup_failure_is_reported() {
        let root = TempDir::new().unwrap();
        let config = PipelineConfig::builder()
            .template(TEMPLATE)
            .scratch_dir(Some(root.path().to_path_buf()))
            .output_dir(root.path())
            .build()
            .unwrap();
        let context = RunContext::new(&config);
        // A plain file where the scratch directory should be cannot be removed as one
        std::fs::write(context.scratch(), b"not a directory").unwrap();
        let mut report = RunReport::new(1);

        clean_scratch(&context, &mut report);

        assert_eq!(report.scratch_left_behind.as_deref(), Some(context.scratch()));
    }

    #[test]
    fn test_successful_cleanup_leaves_report_clean() {
        let root = TempDir::new().unwrap();
        let config = PipelineConfig::builder()
            .template(TEMPLATE)
            .scratch_dir(Some(root.path().to_path_buf()))
            .output_dir(root.path())
            .build()
            .unwrap();
        let context = RunContext::new(&config);
        context.prepare().unwrap();
        let mut report = RunReport::new(1);

        clean_scratch(&context, &mut report);

        assert!(report.scratch_left_behind.is_none());
        assert!(!context.scratch().exists());
    }
}

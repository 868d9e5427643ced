//! Validated run parameters.

use std::path::{Path, PathBuf};

use crate::config::{
    ConfigFile, DownloadConfig, DEFAULT_COMPRESSION, DEFAULT_OUTPUT_NAME, DEFAULT_ZOOM,
    MAX_CONCURRENCY,
};
use crate::coord::MAX_ZOOM;
use crate::mosaic::Compression;
use crate::provider::TileSource;

use super::error::ConfigError;

/// Parameters of one mosaic run. Built through [`PipelineConfigBuilder`],
/// which rejects invalid values before any I/O happens.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    source: TileSource,
    zoom: u8,
    output_dir: PathBuf,
    output_name: String,
    compression: Compression,
    scratch_dir: Option<PathBuf>,
    persist_reprojected: bool,
    download: DownloadConfig,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// `<output_dir>/<output_name>`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Parent directory for the run's scratch directory; the system
    /// temporary directory when unset.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    pub fn persist_reprojected(&self) -> bool {
        self.persist_reprojected
    }

    pub fn download(&self) -> &DownloadConfig {
        &self.download
    }
}

/// Builder for [`PipelineConfig`].
///
/// # Example
///
/// ```
/// use tilemosaic::pipeline::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .template("https://tile.example.org/{z}/{x}/{y}.png")
///     .zoom(10)
///     .output_dir("/tmp/mosaics")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.output_path().to_str(), Some("/tmp/mosaics/out.tif"));
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    template: Option<String>,
    zoom: u8,
    output_dir: PathBuf,
    output_name: String,
    compression: Compression,
    scratch_dir: Option<PathBuf>,
    persist_reprojected: bool,
    download: DownloadConfig,
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self {
            template: None,
            zoom: DEFAULT_ZOOM,
            output_dir: PathBuf::from("."),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            compression: DEFAULT_COMPRESSION,
            scratch_dir: None,
            persist_reprojected: false,
            download: DownloadConfig::default(),
        }
    }
}

impl PipelineConfigBuilder {
    /// Seeds the builder from a loaded configuration file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            template: config.source.template.clone(),
            zoom: config.download.zoom,
            output_dir: config.output.directory.clone(),
            output_name: config.output.name.clone(),
            compression: config.output.compression,
            scratch_dir: config.output.scratch_dir.clone(),
            persist_reprojected: config.boundary.persist_reprojected,
            download: DownloadConfig::from(&config.download),
        }
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn scratch_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.scratch_dir = dir;
        self
    }

    pub fn persist_reprojected(mut self, persist: bool) -> Self {
        self.persist_reprojected = persist;
        self
    }

    pub fn download(mut self, download: DownloadConfig) -> Self {
        self.download = download;
        self
    }

    /// Mutable access to the download settings, for flag overrides.
    pub fn download_mut(&mut self) -> &mut DownloadConfig {
        &mut self.download
    }

    /// Validates every parameter.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let template = self.template.ok_or(ConfigError::MissingTemplate)?;
        let source = TileSource::parse(&template)?;

        if self.zoom > MAX_ZOOM {
            return Err(ConfigError::InvalidZoom(self.zoom));
        }

        let concurrency = self.download.concurrency();
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency {
                value: concurrency,
                max: MAX_CONCURRENCY,
            });
        }

        if self.download.request_timeout_ms() == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let name = self.output_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidOutputName(self.output_name));
        }

        Ok(PipelineConfig {
            source,
            zoom: self.zoom,
            output_dir: self.output_dir,
            output_name: name.to_string(),
            compression: self.compression,
            scratch_dir: self.scratch_dir,
            persist_reprojected: self.persist_reprojected,
            download: self.download,
        })
    }
}

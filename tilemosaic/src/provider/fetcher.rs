//! Per-tile retrieval into the scratch directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::http::AsyncHttpClient;
use super::template::{SourceKind, TileSource};
use super::types::ProviderError;
use crate::config::DownloadConfig;
use crate::coord::TileIndex;
use crate::pipeline::TileError;

/// Extension used when the payload format cannot be recognised.
const FALLBACK_EXTENSION: &str = "img";

/// Largest backoff exponent; keeps the delay computation from overflowing.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// A tile image available on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTile {
    pub index: TileIndex,
    /// Image file (scratch download or local source file)
    pub image_path: PathBuf,
    /// True when the file lives in scratch and may be removed once georeferenced.
    pub owned: bool,
}

/// Retrieves tile images from a [`TileSource`].
///
/// Remote tiles are downloaded with retries and written to the scratch
/// directory as `{x}_{y}_{z}.<ext>`; local tiles are used in place.
pub struct TileFetcher<C> {
    source: TileSource,
    client: C,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    pub fn new(source: TileSource, client: C, config: &DownloadConfig) -> Self {
        Self {
            source,
            client,
            max_retries: config.max_retries(),
            retry_base_delay: config.retry_base_delay(),
        }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    /// Makes the image for `index` available as a file.
    pub async fn fetch(&self, index: TileIndex, scratch: &Path) -> Result<FetchedTile, TileError> {
        match self.source.kind() {
            SourceKind::Remote => self.fetch_remote(index, scratch).await,
            SourceKind::Local => self.fetch_local(index).await,
        }
    }

    async fn fetch_remote(
        &self,
        index: TileIndex,
        scratch: &Path,
    ) -> Result<FetchedTile, TileError> {
        let url = self.source.render(&index);
        let bytes = self.download(index, &url).await?;

        let path = scratch.join(format!("{}.{}", index.file_stem(), sniff_extension(&bytes)));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| TileError::Io { index, source })?;

        trace!(
            x = index.x,
            y = index.y,
            z = index.z,
            bytes = bytes.len(),
            path = %path.display(),
            "Tile written to scratch"
        );

        Ok(FetchedTile {
            index,
            image_path: path,
            owned: true,
        })
    }

    async fn fetch_local(&self, index: TileIndex) -> Result<FetchedTile, TileError> {
        let path = PathBuf::from(self.source.render(&index));

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(FetchedTile {
                index,
                image_path: path,
                owned: false,
            }),
            Ok(_) => Err(TileError::MissingLocalFile { index, path }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TileError::MissingLocalFile { index, path })
            }
            Err(source) => Err(TileError::Io { index, source }),
        }
    }

    /// GET with exponential backoff. Permanent errors stop immediately.
    async fn download(&self, index: TileIndex, url: &str) -> Result<Vec<u8>, TileError> {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            let error = match self.client.get(url).await {
                Ok(bytes) if bytes.is_empty() => {
                    ProviderError::InvalidResponse(format!("empty body from {}", url))
                }
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(TileError::Fetch {
                    index,
                    attempts: attempt,
                    source: error,
                });
            }

            let backoff = self.backoff(attempt);
            debug!(
                x = index.x,
                y = index.y,
                z = index.z,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Tile request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.retry_base_delay.saturating_mul(1u32 << shift)
    }
}

/// File extension matching the image payload, `img` when unknown.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or(FALLBACK_EXTENSION),
        Err(_) => {
            warn!(len = bytes.len(), "Unrecognised tile payload format");
            FALLBACK_EXTENSION
        }
    }
}

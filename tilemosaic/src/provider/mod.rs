//! Tile retrieval
//!
//! This module turns a tile index into an image file on disk:
//!
//! - [`TileSource`]: parsed `{x}`/`{y}`/`{z}` template, remote or local
//! - [`AsyncHttpClient`]: HTTP abstraction, [`AsyncReqwestClient`] in production
//! - [`TileFetcher`]: renders the template, downloads with retries into the
//!   scratch directory, or resolves a local file in place
//!
//! ```ignore
//! use tilemosaic::config::DownloadConfig;
//! use tilemosaic::provider::{AsyncReqwestClient, TileFetcher, TileSource};
//!
//! let config = DownloadConfig::default();
//! let source = TileSource::parse("https://tile.example.org/{z}/{x}/{y}.png")?;
//! let client = AsyncReqwestClient::with_options(config.request_timeout(), config.user_agent())?;
//! let fetcher = TileFetcher::new(source, client, &config);
//! let tile = fetcher.fetch(index, scratch_dir).await?;
//! ```

mod fetcher;
mod http;
mod template;
mod types;

pub use fetcher::{sniff_extension, FetchedTile, TileFetcher};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_USER_AGENT};
pub use template::{SourceKind, TemplateError, TileSource};
pub use types::ProviderError;

#[cfg(test)]
pub use http::tests::{MockAsyncHttpClient, ScriptedHttpClient, SlowHttpClient};

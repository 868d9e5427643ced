//! HTTP transport behind a trait so fetch logic can run against mocks.

use super::types::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// User-Agent sent when none is configured. Some tile servers reject
/// anonymous requests.
pub const DEFAULT_USER_AGENT: &str = concat!("tilemosaic/", env!("CARGO_PKG_VERSION"));

/// Trait for asynchronous HTTP client operations.
///
/// The fetcher is generic over this trait so tests can substitute a mock
/// that never touches the network.
pub trait AsyncHttpClient: Send + Sync {
    /// GETs `url` and returns the body. Non-2xx responses are errors.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// reqwest-backed client sharing one connection pool across workers.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with a 30 second timeout and the default User-Agent.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_options(Duration::from_secs(30), DEFAULT_USER_AGENT)
    }

    /// Creates a client with a custom per-request timeout and User-Agent.
    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("cannot build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        trace!(url, "Tile request");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url, error = %e, timeout = e.is_timeout(), "Tile request failed");
            classify(url, e)
        })?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "Tile response");
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "Tile body could not be read");
            match classify(url, e) {
                ProviderError::HttpError(message) => ProviderError::InvalidResponse(message),
                other => other,
            }
        })?;
        Ok(body.to_vec())
    }
}

/// Maps a transport error onto the retry classification.
fn classify(url: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(url.to_string())
    } else {
        ProviderError::HttpError(format!("{}: {}", url, error))
    }
}

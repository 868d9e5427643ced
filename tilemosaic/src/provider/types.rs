//! Provider error types

use std::fmt;

/// Errors that can occur while retrieving tile bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport-level failure (connection refused, DNS, TLS, client setup)
    HttpError(String),
    /// Server answered with a non-success status
    HttpStatus { status: u16, url: String },
    /// Request exceeded the configured timeout
    Timeout(String),
    /// Response body could not be read
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than 408 and 429 are permanent: a missing tile
    /// stays missing.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ProviderError::HttpError(_)
            | ProviderError::Timeout(_)
            | ProviderError::InvalidResponse(_) => true,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::HttpStatus { status, url } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            ProviderError::Timeout(url) => write!(f, "Request timed out: {}", url),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let status = |status| ProviderError::HttpStatus {
            status,
            url: "http://example.com".to_string(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable(), "404 is permanent");
        assert!(!status(403).is_retryable());
        assert!(ProviderError::Timeout("x".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_status_and_url() {
        let err = ProviderError::HttpStatus {
            status: 404,
            url: "http://tiles.example.com/1/2/3.png".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 404 from http://tiles.example.com/1/2/3.png"
        );
    }
}

//! Typed errors for the scout library.
//!
//! Uses `thiserror` for library errors (not `anyhow`). None of the
//! component errors are fatal to a cycle: the engine logs them, counts
//! them in the cycle summary and carries on.

use thiserror::Error;

/// Top-level errors surfaced by engine construction and bootstrapping.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Configuration could not be read or is invalid
    #[error("config error: {reason}")]
    Config { reason: String },

    /// Classifier model artifact failed to load
    #[error("classifier error: {0}")]
    Classify(#[from] ClassifyError),

    /// Registry backend failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Fetch failed outside of a crawl (e.g. `verify` command)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error (config file, reports directory)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Network-level failures while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or is not http(s)
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Request exceeded the configured timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// DNS, TLS or connection failure
    #[error("connection failed for {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Body could not be read
    #[error("failed reading body from {url}: {reason}")]
    Body { url: String, reason: String },
}

impl FetchError {
    /// Whether another attempt may succeed.
    ///
    /// Timeouts, connection failures and 408/429/5xx responses are
    /// transient; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connect { .. } => true,
            FetchError::Status { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            FetchError::InvalidUrl { .. } | FetchError::Body { .. } => false,
        }
    }
}

/// Classification could not produce a probability.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Page had no usable body
    #[error("empty content: {url}")]
    EmptyContent { url: String },

    /// Response was not an HTML document
    #[error("non-HTML content ({content_type}): {url}")]
    NotHtml { url: String, content_type: String },

    /// Model artifact is malformed
    #[error("invalid model artifact: {reason}")]
    InvalidModel { reason: String },
}

/// Errors from the site registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Optimistic concurrency check failed, or a concurrent insert won
    #[error("persistence conflict on {url}")]
    Conflict { url: String },

    /// Record was expected but is missing
    #[error("site not found: {url}")]
    NotFound { url: String },

    /// Backend failure
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RegistryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistryError::Conflict { .. })
    }
}

/// Errors from the enrichment service. Never surfaced past the enricher:
/// every variant degrades to `Enrichment::Unavailable`.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment request timed out")]
    Timeout,

    #[error("enrichment transport error: {0}")]
    Transport(String),

    #[error("enrichment service returned HTTP {0}")]
    Status(u16),

    #[error("malformed enrichment response: {0}")]
    Malformed(String),
}

/// Errors from a web search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),

    #[error("search API error: HTTP {status}")]
    Status { status: u16 },

    #[error("search response could not be parsed: {0}")]
    Parse(String),

    /// Backend is not configured (e.g. missing API key)
    #[error("search backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for top-level operations.
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let url = "https://example.com".to_string();
        for status in [408, 429, 500, 502, 503, 504] {
            let err = FetchError::Status { url: url.clone(), status };
            assert!(err.is_retryable(), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 410] {
            let err = FetchError::Status { url: url.clone(), status };
            assert!(!err.is_retryable(), "{status} should not be retryable");
        }
        assert!(FetchError::Timeout { url: url.clone() }.is_retryable());
        assert!(!FetchError::InvalidUrl { url }.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::Conflict {
            url: "https://a.tv".to_string(),
        };
        assert_eq!(err.to_string(), "persistence conflict on https://a.tv");
        assert!(err.is_conflict());
    }
}

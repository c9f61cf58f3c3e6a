//! Page fetching.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::FetchResult;
use crate::types::FetchedPage;

/// Fetches a single URL.
///
/// One call is one attempt; retry policy lives with the caller. Non-2xx
/// responses are returned as `FetchError::Status`, with 3xx followed by
/// the implementation.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage>;

    /// Fetch with a tighter timeout than the fetcher's default.
    ///
    /// Used by the verification probe. Implementations without per-request
    /// timeouts fall back to `fetch`.
    async fn fetch_with_timeout(&self, url: &Url, timeout: Duration) -> FetchResult<FetchedPage> {
        let _ = timeout;
        self.fetch(url).await
    }
}

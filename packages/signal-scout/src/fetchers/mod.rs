//! Page fetcher implementations and retry policy.

pub mod http;

pub use http::HttpFetcher;

use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::FetchResult;
use crate::traits::fetcher::PageFetcher;
use crate::types::FetchedPage;

/// Retry policy for transient fetch failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_backoff: Duration) -> Self {
        Self {
            retries,
            base_backoff,
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}

/// Fetch `url`, retrying transient failures with exponential backoff.
///
/// Returns the page or the last error, plus the number of attempts made.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &Url,
    policy: RetryPolicy,
) -> (FetchResult<FetchedPage>, u32) {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match fetcher.fetch(url).await {
            Ok(page) => return (Ok(page), attempts),
            Err(e) if e.is_retryable() && attempts <= policy.retries => {
                let delay = policy.backoff(attempts);
                debug!(url = %url, attempt = attempts, delay_ms = delay.as_millis() as u64, error = %e, "Retrying fetch");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (Err(e), attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::testing::MockFetcher;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let url = Url::parse("https://flaky.tv/").unwrap();
        let fetcher = MockFetcher::new()
            .with_failures(url.as_str(), 2, 503)
            .with_page(url.as_str(), "<html><title>ok</title></html>");

        let (result, attempts) = fetch_with_retry(&fetcher, &url, RetryPolicy::new(2, Duration::ZERO)).await;
        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let url = Url::parse("https://down.tv/").unwrap();
        let fetcher = MockFetcher::new().with_failures(url.as_str(), 10, 502);

        let (result, attempts) = fetch_with_retry(&fetcher, &url, RetryPolicy::new(2, Duration::ZERO)).await;
        assert!(matches!(result, Err(FetchError::Status { status: 502, .. })));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_not_found() {
        let url = Url::parse("https://gone.tv/").unwrap();
        let fetcher = MockFetcher::new().with_failures(url.as_str(), 10, 404);

        let (result, attempts) = fetch_with_retry(&fetcher, &url, RetryPolicy::new(2, Duration::ZERO)).await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}

//! reqwest-backed fetcher.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult, Result, ScoutError};
use crate::traits::fetcher::PageFetcher;
use crate::types::{CrawlConfig, FetchedPage};

/// HTTP fetcher. Follows redirects; a non-2xx final status is an error.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Build a fetcher from crawl settings.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScoutError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn get(&self, url: &Url, timeout: Option<Duration>) -> FetchResult<FetchedPage> {
        debug!(url = %url, "HTTP fetch starting");
        let started = Instant::now();

        let mut request = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5");
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            map_reqwest_error(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(
            FetchedPage::new(url.clone(), final_url, status.as_u16(), content_type, body)
                .with_elapsed(started.elapsed()),
        )
    }
}

fn map_reqwest_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = e.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage> {
        self.get(url, None).await
    }

    async fn fetch_with_timeout(&self, url: &Url, timeout: Duration) -> FetchResult<FetchedPage> {
        self.get(url, Some(timeout)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_from_default_config() {
        assert!(HttpFetcher::new(&CrawlConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let fetcher = HttpFetcher::new(&CrawlConfig::default().with_max_pages(1)).unwrap();
        // Port 9 (discard) is almost never listening locally.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = fetcher
            .fetch_with_timeout(&url, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}

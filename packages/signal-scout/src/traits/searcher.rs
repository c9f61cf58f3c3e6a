//! Web search backend used by the query seed strategy.

use async_trait::async_trait;
use url::Url;

use crate::error::SearchError;

/// A URL returned by a search backend.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: Url,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

impl SearchResult {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            title: None,
            snippet: None,
        }
    }

    /// Create from a URL string.
    pub fn from_url(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(Self::new)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Searches the open web for candidate sites.
///
/// Results must come back in a stable order for identical responses so
/// seed generation stays deterministic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError>;
}

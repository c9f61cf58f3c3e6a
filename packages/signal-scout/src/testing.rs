//! Testing utilities including mock implementations.
//!
//! These let applications and tests drive the scout without network
//! access or a real enrichment service.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

use crate::canonical::CanonicalUrl;
use crate::error::{FetchError, FetchResult, RegistryError, RegistryResult, SearchError};
use crate::stores::MemoryRegistry;
use crate::traits::enricher::{Enricher, Enrichment, EnrichmentRequest};
use crate::traits::fetcher::PageFetcher;
use crate::traits::registry::Registry;
use crate::traits::searcher::{SearchResult, WebSearcher};
use crate::types::{FetchedPage, SiteRecord, SiteStatus};

fn key(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

#[derive(Clone)]
struct MockPage {
    body: String,
    content_type: String,
}

/// A mock fetcher serving canned pages.
///
/// Unknown URLs fail with a connection error, like an unreachable host.
#[derive(Default)]
pub struct MockFetcher {
    pages: RwLock<HashMap<String, MockPage>>,
    /// Remaining forced failures and the status they return.
    failures: RwLock<HashMap<String, (u32, u16)>>,
    redirects: RwLock<HashMap<String, Url>>,
    delay: Option<Duration>,
    calls: RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` at `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.set_page(url, html);
        self
    }

    /// Serve a body with an explicit content type.
    pub fn with_typed_page(self, url: &str, body: &str, content_type: &str) -> Self {
        self.pages.write().unwrap().insert(
            key(url),
            MockPage {
                body: body.to_string(),
                content_type: content_type.to_string(),
            },
        );
        self
    }

    /// Fail the next `count` requests for `url` with `status`.
    pub fn with_failures(self, url: &str, count: u32, status: u16) -> Self {
        self.failures.write().unwrap().insert(key(url), (count, status));
        self
    }

    /// Answer requests for `from` with the page served at `to`.
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        if let Ok(target) = Url::parse(to) {
            self.redirects.write().unwrap().insert(key(from), target);
        }
        self
    }

    /// Delay every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.pages.write().unwrap().insert(
            key(url),
            MockPage {
                body: html.to_string(),
                content_type: "text/html; charset=utf-8".to_string(),
            },
        );
    }

    /// Make `url` unreachable from now on.
    pub fn remove_page(&self, url: &str) {
        self.pages.write().unwrap().remove(&key(url));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        let url = key(url);
        self.calls.read().unwrap().iter().filter(|c| **c == url).count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage> {
        let k = url.to_string();
        self.calls.write().unwrap().push(k.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let forced = {
            let mut failures = self.failures.write().unwrap();
            match failures.get_mut(&k) {
                Some((remaining, status)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(*status)
                }
                _ => None,
            }
        };
        if let Some(status) = forced {
            return Err(FetchError::Status { url: k, status });
        }

        let final_url = self
            .redirects
            .read()
            .unwrap()
            .get(&k)
            .cloned()
            .unwrap_or_else(|| url.clone());
        let page = self.pages.read().unwrap().get(final_url.as_str()).cloned();
        match page {
            Some(page) => Ok(FetchedPage::new(
                url.clone(),
                final_url,
                200,
                Some(page.content_type),
                page.body,
            )),
            None => Err(FetchError::Connect {
                url: k,
                reason: "no such host".to_string(),
            }),
        }
    }
}

/// A mock web searcher with canned results per query.
#[derive(Default)]
pub struct MockSearcher {
    results: RwLock<HashMap<String, Vec<SearchResult>>>,
    failing: RwLock<HashSet<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls(self, query: &str, urls: &[&str]) -> Self {
        let results = urls.iter().filter_map(|u| SearchResult::from_url(u)).collect();
        self.results.write().unwrap().insert(query.to_string(), results);
        self
    }

    pub fn with_failure(self, query: &str) -> Self {
        self.failing.write().unwrap().insert(query.to_string());
        self
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        if self.failing.read().unwrap().contains(query) {
            return Err(SearchError::Status { status: 500 });
        }
        let mut results = self.results.read().unwrap().get(query).cloned().unwrap_or_default();
        results.truncate(limit);
        Ok(results)
    }
}

/// A mock enricher that returns a fixed response and counts calls.
pub struct MockEnricher {
    response: Enrichment,
    calls: AtomicUsize,
}

impl MockEnricher {
    pub fn new(response: Enrichment) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    /// Enricher that claims every site is a sports streaming portal.
    pub fn sports_streaming() -> Self {
        Self::new(Enrichment::Enriched {
            service_name: "Mock Stream".to_string(),
            category: "Sports Streaming".to_string(),
            reasoning: "embedded player and live schedule".to_string(),
            is_target: true,
        })
    }

    /// Enricher that never produces a result.
    pub fn unavailable() -> Self {
        Self::new(Enrichment::Unavailable)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(&self, _request: &EnrichmentRequest) -> Enrichment {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Registry wrapper whose first `n` writes fail with a persistence conflict.
pub struct ConflictingRegistry {
    inner: MemoryRegistry,
    remaining: AtomicU32,
}

impl ConflictingRegistry {
    pub fn new(inner: MemoryRegistry, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
        }
    }

    pub fn inner(&self) -> &MemoryRegistry {
        &self.inner
    }

    fn take_conflict(&self, url: &CanonicalUrl) -> RegistryResult<()> {
        let conflicted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            Err(RegistryError::Conflict { url: url.to_string() })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Registry for ConflictingRegistry {
    async fn get(&self, url: &CanonicalUrl) -> RegistryResult<Option<SiteRecord>> {
        self.inner.get(url).await
    }

    async fn insert(&self, record: SiteRecord) -> RegistryResult<SiteRecord> {
        self.take_conflict(&record.canonical_url)?;
        self.inner.insert(record).await
    }

    async fn update(&self, record: SiteRecord, expected_version: i64) -> RegistryResult<SiteRecord> {
        self.take_conflict(&record.canonical_url)?;
        self.inner.update(record, expected_version).await
    }

    async fn annotate(
        &self,
        url: &CanonicalUrl,
        category: Option<String>,
        reasoning: Option<String>,
    ) -> RegistryResult<()> {
        self.inner.annotate(url, category, reasoning).await
    }

    async fn list_by_status(&self, status: SiteStatus, limit: usize) -> RegistryResult<Vec<SiteRecord>> {
        self.inner.list_by_status(status, limit).await
    }

    async fn list_all(&self) -> RegistryResult<Vec<SiteRecord>> {
        self.inner.list_all().await
    }
}

/// Canned HTML documents.
pub mod fixtures {
    /// A live sports streaming portal. Contains no links.
    pub const STREAM_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Watch NBA Live Stream Free HD</title>
  <meta name="description" content="Live sports streams: NFL, NBA, soccer and football schedule">
  <script src="https://cdn.jwplayer.com/libraries/player.js"></script>
</head>
<body>
  <div id="player" class="video-player">
    <video src="/live/stream.m3u8" controls></video>
  </div>
  <iframe src="https://embed.streams.example/player/nba-1"></iframe>
  <div class="schedule">
    <table class="games">
      <tr><td>Lakers vs Celtics</td><td>Live now</td></tr>
      <tr><td>Knicks vs Heat</td><td>8pm</td></tr>
    </table>
  </div>
  <p>Watch live NBA games tonight. Live streams for every match on the schedule.</p>
  <script>jwplayer("player").setup({ file: "/live/stream.m3u8" });</script>
</body>
</html>"#;

    /// An unrelated content page.
    pub const BLOG_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Grandma's Kitchen</title></head>
<body>
  <article>
    <h1>Sourdough</h1>
    <p>Mix flour and water, then wait a day before baking the loaf.</p>
    <p>Keep the starter somewhere warm and feed it each morning.</p>
  </article>
</body>
</html>"#;

    /// A directory page linking to `links` with streaming anchor text.
    pub fn hub_page(links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<li><a href="{l}">Watch live stream</a></li>"#))
            .collect();
        format!(
            r#"<!DOCTYPE html>
<html>
<head><title>Link directory</title></head>
<body>
  <ul>{anchors}</ul>
  <a href="/privacy">Privacy</a>
</body>
</html>"#
        )
    }
}

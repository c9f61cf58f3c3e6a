//! Page and frontier types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use url::Url;

use crate::canonical::CanonicalUrl;
use crate::types::site::DiscoverySource;

/// A page returned by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: Url,
    /// URL after redirects.
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// SHA-256 of the body, hex encoded.
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl FetchedPage {
    /// Build a page, hashing the body.
    pub fn new(url: Url, final_url: Url, status: u16, content_type: Option<String>, body: String) -> Self {
        let content_hash = hash_content(&body);
        Self {
            url,
            final_url,
            status,
            content_type,
            body,
            content_hash,
            fetched_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// 2xx or 3xx.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// True when the content type is missing or names an HTML document.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            None => true,
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
        }
    }
}

/// Hex-encoded SHA-256 of page content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// A discovery seed. `sources` lists every strategy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub url: Url,
    pub canonical: CanonicalUrl,
    pub sources: Vec<DiscoverySource>,
}

impl Seed {
    pub fn new(url: Url, canonical: CanonicalUrl, source: DiscoverySource) -> Self {
        Self {
            url,
            canonical,
            sources: vec![source],
        }
    }

    /// Record another strategy that found this seed.
    pub fn add_source(&mut self, source: DiscoverySource) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }
}

/// Frontier item state: `Queued -> Fetching -> {Fetched | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    Queued,
    Fetching,
    Fetched,
    Failed,
}

impl FetchState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        matches!(
            (self, next),
            (FetchState::Queued, FetchState::Fetching)
                | (FetchState::Fetching, FetchState::Fetched)
                | (FetchState::Fetching, FetchState::Failed)
        )
    }
}

/// A URL scheduled for fetching in the current cycle.
#[derive(Debug, Clone)]
pub struct FrontierItem {
    pub url: Url,
    pub depth: usize,
    pub parent_url: Option<Url>,
    pub relevancy_score: f32,
    /// Strategies that led to this URL (inherited from the seed).
    pub sources: Vec<DiscoverySource>,
    pub state: FetchState,
    pub attempts: u32,
    /// Insertion order, for FIFO tie-breaking.
    pub(crate) sequence: u64,
}

impl FrontierItem {
    /// A seed entering the frontier at depth 0 with maximum relevancy.
    pub fn seed(seed: &Seed) -> Self {
        Self {
            url: seed.url.clone(),
            depth: 0,
            parent_url: None,
            relevancy_score: 1.0,
            sources: seed.sources.clone(),
            state: FetchState::Queued,
            attempts: 0,
            sequence: 0,
        }
    }

    /// A link discovered on `parent`.
    pub fn child(parent: &FrontierItem, url: Url, relevancy_score: f32) -> Self {
        Self {
            url,
            depth: parent.depth + 1,
            parent_url: Some(parent.url.clone()),
            relevancy_score,
            sources: parent.sources.clone(),
            state: FetchState::Queued,
            attempts: 0,
            sequence: 0,
        }
    }

    /// Move to `next` if the state machine allows it.
    pub fn advance(&mut self, next: FetchState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_state_transitions() {
        assert!(FetchState::Queued.can_transition_to(FetchState::Fetching));
        assert!(FetchState::Fetching.can_transition_to(FetchState::Fetched));
        assert!(FetchState::Fetching.can_transition_to(FetchState::Failed));
        assert!(!FetchState::Queued.can_transition_to(FetchState::Fetched));
        assert!(!FetchState::Fetched.can_transition_to(FetchState::Queued));
        assert!(!FetchState::Failed.can_transition_to(FetchState::Fetching));
    }

    #[test]
    fn test_item_rejects_skipped_states() {
        let url = Url::parse("https://a.tv/").unwrap();
        let canonical = CanonicalUrl::from_url(&url).unwrap();
        let mut item = FrontierItem::seed(&Seed::new(url, canonical, DiscoverySource::Query));
        assert!(!item.advance(FetchState::Fetched));
        assert_eq!(item.state, FetchState::Queued);
        assert!(item.advance(FetchState::Fetching));
        assert!(item.advance(FetchState::Failed));
        assert!(!item.advance(FetchState::Fetching));
        assert_eq!(item.state, FetchState::Failed);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(hash_content("abc"), hash_content("abc"));
        assert_ne!(hash_content("abc"), hash_content("abd"));
        assert_eq!(hash_content("").len(), 64);
    }

    #[test]
    fn test_is_html() {
        let url = Url::parse("https://a.tv").unwrap();
        let page = FetchedPage::new(url.clone(), url.clone(), 200, Some("text/html; charset=utf-8".into()), String::new());
        assert!(page.is_html());
        let page = FetchedPage::new(url.clone(), url, 200, Some("application/pdf".into()), String::new());
        assert!(!page.is_html());
    }

    #[test]
    fn test_seed_sources_deduplicate() {
        let url = Url::parse("https://a.tv/x").unwrap();
        let canonical = CanonicalUrl::from_url(&url).unwrap();
        let mut seed = Seed::new(url, canonical, DiscoverySource::Query);
        seed.add_source(DiscoverySource::Query);
        seed.add_source(DiscoverySource::Permutation);
        assert_eq!(seed.sources, vec![DiscoverySource::Query, DiscoverySource::Permutation]);
    }
}

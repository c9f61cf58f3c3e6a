//! Seed generation.
//!
//! Each strategy turns configuration (or last cycle's feedback) into
//! candidate URLs. Strategies run concurrently; their output is merged in
//! a fixed strategy order, deduplicated by canonical URL with every
//! contributing source recorded on the seed, and filtered against the
//! excluded domains.

pub mod tavily;

pub use tavily::TavilySearcher;

use futures::future::join_all;
use indexmap::IndexMap;
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::canonical::{domain_key, CanonicalUrl};
use crate::html;
use crate::traits::fetcher::PageFetcher;
use crate::traits::searcher::WebSearcher;
use crate::types::{DiscoverySource, Seed, SeedConfig};

/// A seed generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedStrategy {
    StaticList,
    Query,
    Aggregator,
    Permutation,
    RegistryFeedback,
}

impl SeedStrategy {
    /// Merge order.
    pub const ALL: [SeedStrategy; 5] = [
        SeedStrategy::StaticList,
        SeedStrategy::Query,
        SeedStrategy::Aggregator,
        SeedStrategy::Permutation,
        SeedStrategy::RegistryFeedback,
    ];

    pub fn source(&self) -> DiscoverySource {
        match self {
            SeedStrategy::StaticList => DiscoverySource::StaticList,
            SeedStrategy::Query => DiscoverySource::Query,
            SeedStrategy::Aggregator => DiscoverySource::Aggregator,
            SeedStrategy::Permutation => DiscoverySource::Permutation,
            SeedStrategy::RegistryFeedback => DiscoverySource::RegistryFeedback,
        }
    }
}

/// A strategy that produced nothing because it failed.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: SeedStrategy,
    pub reason: String,
}

/// Output of one generation pass.
#[derive(Debug, Default)]
pub struct SeedBatch {
    pub seeds: Vec<Seed>,
    pub failures: Vec<StrategyFailure>,
}

impl SeedBatch {
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

type StrategyOutput = Result<Vec<Url>, String>;

/// Generates the seed set for a cycle.
pub struct SeedGenerator {
    config: SeedConfig,
    fetcher: Arc<dyn PageFetcher>,
    searcher: Option<Arc<dyn WebSearcher>>,
}

impl SeedGenerator {
    pub fn new(config: SeedConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            config,
            fetcher,
            searcher: None,
        }
    }

    /// Enable the query strategy.
    pub fn with_searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    /// Run every strategy and merge the results.
    ///
    /// `feedback` holds last cycle's confirmed sites. A failing strategy
    /// contributes nothing; the others are unaffected.
    pub async fn generate(&self, feedback: &[CanonicalUrl]) -> SeedBatch {
        let (static_list, query, aggregator, permutation, registry) = tokio::join!(
            async { Ok::<_, String>(self.static_list()) },
            self.query(),
            self.aggregator(),
            async { Ok::<_, String>(self.permutation()) },
            async { Ok::<_, String>(feedback_urls(feedback)) },
        );

        let outputs = SeedStrategy::ALL
            .into_iter()
            .zip([static_list, query, aggregator, permutation, registry]);

        let mut merged: IndexMap<CanonicalUrl, Seed> = IndexMap::new();
        let mut batch = SeedBatch::default();
        let mut excluded = 0usize;

        for (strategy, output) in outputs {
            let urls = match output {
                Ok(urls) => urls,
                Err(reason) => {
                    warn!(strategy = ?strategy, reason = %reason, "Seed strategy failed");
                    batch.failures.push(StrategyFailure { strategy, reason });
                    continue;
                }
            };
            debug!(strategy = ?strategy, count = urls.len(), "Seed strategy produced URLs");

            for url in urls {
                if self.is_excluded(&url) {
                    excluded += 1;
                    continue;
                }
                let Ok(canonical) = CanonicalUrl::from_url(&url) else {
                    continue;
                };
                merged
                    .entry(canonical.clone())
                    .and_modify(|seed| seed.add_source(strategy.source()))
                    .or_insert_with(|| Seed::new(url, canonical, strategy.source()));
            }
        }

        batch.seeds = merged.into_values().collect();
        info!(
            seeds = batch.seeds.len(),
            corroborated = batch.seeds.iter().filter(|s| s.sources.len() > 1).count(),
            excluded,
            failed_strategies = batch.failures.len(),
            "Seed generation complete"
        );
        batch
    }

    /// Whether a URL's host is an excluded domain or a subdomain of one.
    pub fn is_excluded(&self, url: &Url) -> bool {
        let host = domain_key(url);
        self.config.excluded_domains.iter().any(|d| {
            let d = d.trim().to_ascii_lowercase();
            !d.is_empty() && (host == d || host.ends_with(&format!(".{d}")))
        })
    }

    fn static_list(&self) -> Vec<Url> {
        self.config
            .static_urls
            .iter()
            .filter_map(|raw| {
                let url = parse_seed_url(raw);
                if url.is_none() {
                    warn!(url = %raw, "Ignoring invalid static seed URL");
                }
                url
            })
            .collect()
    }

    fn permutation(&self) -> Vec<Url> {
        let permutation = &self.config.permutation;
        permutation
            .bases
            .iter()
            .flat_map(|base| {
                permutation
                    .tlds
                    .iter()
                    .map(move |tld| format!("https://{}{}", base.trim(), tld.trim()))
            })
            .filter_map(|raw| Url::parse(&raw).ok())
            .collect()
    }

    async fn query(&self) -> StrategyOutput {
        if self.config.queries.is_empty() {
            return Ok(vec![]);
        }
        let Some(searcher) = &self.searcher else {
            debug!("No search backend configured, skipping query strategy");
            return Ok(vec![]);
        };

        let limit = self.config.results_per_query;
        let results = join_all(self.config.queries.iter().map(|q| searcher.search(q, limit))).await;

        let mut urls = vec![];
        let mut errors = vec![];
        for (query, result) in self.config.queries.iter().zip(results) {
            match result {
                Ok(results) => urls.extend(results.into_iter().map(|r| r.url)),
                Err(e) => {
                    warn!(query = %query, error = %e, "Search query failed");
                    errors.push(e.to_string());
                }
            }
        }

        if errors.len() == self.config.queries.len() {
            return Err(format!("all {} queries failed: {}", errors.len(), errors.join("; ")));
        }
        Ok(urls)
    }

    async fn aggregator(&self) -> StrategyOutput {
        if self.config.aggregator_urls.is_empty() {
            return Ok(vec![]);
        }

        let mut urls = vec![];
        let mut errors = vec![];
        for raw in &self.config.aggregator_urls {
            let Some(page_url) = parse_seed_url(raw) else {
                errors.push(format!("invalid aggregator URL {raw}"));
                continue;
            };
            match self.fetcher.fetch(&page_url).await {
                Ok(page) => {
                    let found = self.listing_links(&page.final_url, &page.body);
                    debug!(aggregator = %page_url, links = found.len(), "Aggregator page scanned");
                    urls.extend(found);
                }
                Err(e) => {
                    warn!(aggregator = %page_url, error = %e, "Aggregator fetch failed");
                    errors.push(e.to_string());
                }
            }
        }

        if errors.len() == self.config.aggregator_urls.len() {
            return Err(errors.join("; "));
        }
        Ok(urls)
    }

    /// Outbound site roots on a listing page whose domain looks like a
    /// streaming brand.
    fn listing_links(&self, page_url: &Url, body: &str) -> Vec<Url> {
        let document = Html::parse_document(body);
        let own_domain = domain_key(page_url);
        let keywords: Vec<String> = self
            .config
            .aggregator_keywords
            .iter()
            .map(|k| k.to_ascii_lowercase())
            .collect();

        html::links(&document, page_url)
            .into_iter()
            .filter(|link| {
                let domain = domain_key(&link.url);
                domain != own_domain && keywords.iter().any(|k| domain.contains(k.as_str()))
            })
            .filter_map(|link| CanonicalUrl::from_url(&link.url).ok()?.to_url().ok())
            .collect()
    }
}

fn feedback_urls(feedback: &[CanonicalUrl]) -> Vec<Url> {
    feedback.iter().filter_map(|c| c.to_url().ok()).collect()
}

/// Parse a configured URL, accepting bare hosts as https.
fn parse_seed_url(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}")).ok()?,
        Err(_) => return None,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, MockSearcher};
    use crate::types::PermutationConfig;

    fn generator(config: SeedConfig, fetcher: MockFetcher) -> SeedGenerator {
        SeedGenerator::new(config, Arc::new(fetcher))
    }

    #[tokio::test]
    async fn test_permutation_and_static_merge_sources() {
        let config = SeedConfig {
            permutation: PermutationConfig {
                bases: vec!["streameast".into()],
                tlds: vec![".app".into(), ".io".into()],
            },
            ..SeedConfig::empty()
        }
        .with_static_urls(["https://streameast.app/live", "methstreams.com"]);

        let batch = generator(config, MockFetcher::new()).generate(&[]).await;
        let urls: Vec<_> = batch.seeds.iter().map(|s| s.canonical.as_str()).collect();
        assert_eq!(urls, vec!["https://streameast.app", "https://methstreams.com", "https://streameast.io"]);

        let corroborated = &batch.seeds[0];
        assert_eq!(
            corroborated.sources,
            vec![DiscoverySource::StaticList, DiscoverySource::Permutation]
        );
        assert_eq!(corroborated.url.path(), "/live");
        assert!(batch.failures.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_domains_are_dropped() {
        let config = SeedConfig::empty().with_static_urls([
            "https://www.youtube.com/watch?v=1",
            "https://m.facebook.com/page",
            "https://goodstreams.tv",
        ]);
        let batch = generator(config, MockFetcher::new()).generate(&[]).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.seeds[0].canonical.as_str(), "https://goodstreams.tv");
    }

    #[tokio::test]
    async fn test_failed_strategy_does_not_block_others() {
        let searcher = MockSearcher::new().with_failure("nba live stream");
        let config = SeedConfig::empty()
            .with_queries(["nba live stream"])
            .with_static_urls(["https://a.tv"]);

        let batch = generator(config, MockFetcher::new())
            .with_searcher(Arc::new(searcher))
            .generate(&[])
            .await;

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].strategy, SeedStrategy::Query);
    }

    #[tokio::test]
    async fn test_query_results_are_limited_and_deterministic() {
        let searcher = Arc::new(MockSearcher::new().with_urls(
            "free sports",
            &["https://one.tv/game", "https://two.tv", "https://three.tv"],
        ));
        let config = SeedConfig {
            results_per_query: 2,
            ..SeedConfig::empty().with_queries(["free sports"])
        };

        let gen = generator(config, MockFetcher::new()).with_searcher(searcher);
        let first = gen.generate(&[]).await;
        let second = gen.generate(&[]).await;
        assert_eq!(first.seeds, second.seeds);
        let urls: Vec<_> = first.seeds.iter().map(|s| s.canonical.as_str()).collect();
        assert_eq!(urls, vec!["https://one.tv", "https://two.tv"]);
    }

    #[tokio::test]
    async fn test_each_query_is_searched_once_with_configured_limit() {
        use crate::traits::searcher::{MockWebSearcher, SearchResult};

        let mut searcher = MockWebSearcher::new();
        searcher
            .expect_search()
            .withf(|_, limit| *limit == 3)
            .times(2)
            .returning(|query, _| {
                let host = query.replace(' ', "");
                Ok(SearchResult::from_url(&format!("https://{host}.tv/")).into_iter().collect())
            });

        let config = SeedConfig {
            results_per_query: 3,
            ..SeedConfig::empty().with_queries(["nba live", "nfl live"])
        };
        let batch = generator(config, MockFetcher::new())
            .with_searcher(Arc::new(searcher))
            .generate(&[])
            .await;

        let urls: Vec<_> = batch.seeds.iter().map(|s| s.canonical.as_str()).collect();
        assert_eq!(urls, vec!["https://nbalive.tv", "https://nfllive.tv"]);
        assert!(batch.seeds.iter().all(|s| s.sources == vec![DiscoverySource::Query]));
    }

    #[tokio::test]
    async fn test_aggregator_keeps_streaming_domains() {
        let listing = r#"<html><body>
            <a href="https://sportsurge.net/nba">Sportsurge</a>
            <a href="https://recipes.example/">Recipes</a>
            <a href="/about">About</a>
            <a href="https://methstreams.com">Meth</a>
        </body></html>"#;
        let fetcher = MockFetcher::new().with_page("https://list.example/", listing);
        let config = SeedConfig {
            aggregator_urls: vec!["https://list.example/".into()],
            ..SeedConfig::empty()
        };

        let batch = generator(config, fetcher).generate(&[]).await;
        let urls: Vec<_> = batch.seeds.iter().map(|s| s.canonical.as_str()).collect();
        assert_eq!(urls, vec!["https://sportsurge.net", "https://methstreams.com"]);
        assert!(batch.seeds.iter().all(|s| s.sources == vec![DiscoverySource::Aggregator]));
    }

    #[tokio::test]
    async fn test_unreachable_aggregator_is_a_failure() {
        let config = SeedConfig {
            aggregator_urls: vec!["https://gone.example/".into()],
            ..SeedConfig::empty()
        };
        let batch = generator(config, MockFetcher::new()).generate(&[]).await;
        assert!(batch.is_empty());
        assert_eq!(batch.failures[0].strategy, SeedStrategy::Aggregator);
    }

    #[tokio::test]
    async fn test_feedback_seeds_merge_with_configured() {
        let config = SeedConfig::empty().with_static_urls(["https://a.tv"]);
        let feedback = vec![
            CanonicalUrl::parse("https://a.tv").unwrap(),
            CanonicalUrl::parse("https://b.tv").unwrap(),
        ];
        let batch = generator(config, MockFetcher::new()).generate(&feedback).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.seeds[0].sources,
            vec![DiscoverySource::StaticList, DiscoverySource::RegistryFeedback]
        );
        assert_eq!(batch.seeds[1].sources, vec![DiscoverySource::RegistryFeedback]);
    }
}

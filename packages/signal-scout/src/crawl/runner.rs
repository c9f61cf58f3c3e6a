//! Bounded, polite crawl over the frontier.
//!
//! Workers fetch, classify and extract links; the dispatch loop owns the
//! frontier and the counters. Results arriving after cancellation are
//! dropped. Pages that land on an already-classified URL with identical
//! content reuse that classification.

use dashmap::DashMap;
use indexmap::IndexMap;
use scraper::Html;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::frontier::{Admission, Frontier};
use super::politeness::Politeness;
use super::relevancy::LinkScorer;
use crate::canonical::CanonicalUrl;
use crate::classifier::ContentClassifier;
use crate::error::{ClassifyError, FetchError};
use crate::fetchers::{fetch_with_retry, RetryPolicy};
use crate::html;
use crate::traits::fetcher::PageFetcher;
use crate::types::{
    ClassificationResult, CrawlConfig, DiscoverySource, FetchState, FetchedPage, FrontierItem,
    Seed, TerminationReason, VerificationCandidate,
};

/// What one crawl produced.
#[derive(Debug)]
pub struct CrawlReport {
    pub termination: TerminationReason,
    pub pages_crawled: usize,
    pub fetch_failures: usize,
    pub classified_positive: usize,
    pub classified_negative: usize,
    pub classification_errors: usize,
    /// Pages whose classification was taken from an identical earlier page.
    pub classifications_reused: usize,
    /// Positive sites, keyed by canonical URL, in discovery order.
    pub candidates: IndexMap<CanonicalUrl, VerificationCandidate>,
    /// Every dispatched item in its final state.
    pub visited: Vec<FrontierItem>,
}

impl CrawlReport {
    fn new() -> Self {
        Self {
            termination: TerminationReason::Exhausted,
            pages_crawled: 0,
            fetch_failures: 0,
            classified_positive: 0,
            classified_negative: 0,
            classification_errors: 0,
            classifications_reused: 0,
            candidates: IndexMap::new(),
            visited: vec![],
        }
    }
}

/// Result of processing one frontier item on a worker.
struct PageResult {
    item: FrontierItem,
    fetch: Result<Analysis, FetchError>,
}

struct Analysis {
    classification: Result<ClassificationResult, ClassifyError>,
    reused: bool,
    page: FetchedPage,
    children: Vec<FrontierItem>,
}

struct WorkerContext {
    fetcher: Arc<dyn PageFetcher>,
    classifier: ContentClassifier,
    scorer: LinkScorer,
    politeness: Politeness,
    retry: RetryPolicy,
    config: CrawlConfig,
    /// Keyed by final URL and content hash.
    classified: DashMap<(Url, String), ClassificationResult>,
}

/// Crawls from a set of seeds and reports positive sites.
pub struct SiteCrawler {
    fetcher: Arc<dyn PageFetcher>,
    classifier: ContentClassifier,
    scorer: LinkScorer,
    config: CrawlConfig,
}

impl SiteCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        classifier: ContentClassifier,
        scorer: LinkScorer,
        config: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            scorer,
            config,
        }
    }

    /// Run until the page limit, cancellation, or an empty frontier.
    pub async fn run(&self, seeds: &[Seed], cancel: &CancellationToken) -> CrawlReport {
        let config = &self.config;
        let ctx = Arc::new(WorkerContext {
            fetcher: self.fetcher.clone(),
            classifier: self.classifier.clone(),
            scorer: self.scorer.clone(),
            politeness: Politeness::new(config),
            retry: RetryPolicy::new(config.retry_times, std::time::Duration::from_millis(config.retry_backoff_ms)),
            config: config.clone(),
            classified: DashMap::new(),
        });

        let mut frontier = Frontier::new(config.max_depth, config.max_pages_per_domain);
        for seed in seeds {
            frontier.push(FrontierItem::seed(seed));
        }

        info!(
            seeds = seeds.len(),
            queued = frontier.len(),
            max_pages = config.max_pages,
            max_depth = config.max_depth,
            "Starting crawl"
        );

        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        let mut in_flight: JoinSet<PageResult> = JoinSet::new();
        let mut report = CrawlReport::new();
        let mut dispatched = 0usize;

        loop {
            while !cancel.is_cancelled() && dispatched < config.max_pages {
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };
                let Some(item) = frontier.pop() else {
                    break;
                };
                dispatched += 1;
                let ctx = ctx.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    process(ctx, item).await
                });
            }

            if cancel.is_cancelled() {
                report.termination = TerminationReason::Timeout;
                break;
            }
            if in_flight.is_empty() {
                report.termination = if dispatched >= config.max_pages {
                    TerminationReason::PageLimit
                } else {
                    TerminationReason::Exhausted
                };
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    report.termination = TerminationReason::Timeout;
                    break;
                }
                joined = in_flight.join_next() => {
                    match joined {
                        Some(Ok(result)) => self.absorb(result, &mut frontier, &mut report),
                        Some(Err(e)) => warn!(error = %e, "Crawl worker panicked"),
                        None => {}
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            debug!(discarded = in_flight.len(), "Discarding in-flight fetches");
            in_flight.abort_all();
        }

        info!(
            termination = ?report.termination,
            pages = report.pages_crawled,
            failures = report.fetch_failures,
            positive = report.classified_positive,
            negative = report.classified_negative,
            candidates = report.candidates.len(),
            "Crawl finished"
        );

        report
    }

    fn absorb(&self, result: PageResult, frontier: &mut Frontier, report: &mut CrawlReport) {
        let PageResult { item, fetch } = result;
        match fetch {
            Err(e) => {
                report.fetch_failures += 1;
                debug!(url = %item.url, attempts = item.attempts, error = %e, "Fetch failed");
            }
            Ok(analysis) => {
                report.pages_crawled += 1;
                if analysis.reused {
                    report.classifications_reused += 1;
                }
                match analysis.classification {
                    Err(e) => {
                        report.classification_errors += 1;
                        debug!(url = %item.url, error = %e, "Page skipped by classifier");
                    }
                    Ok(classification) if classification.is_positive() => {
                        report.classified_positive += 1;
                        if let Some(candidate) = candidate_for(&item, &analysis.page, &classification) {
                            info!(
                                url = %candidate.canonical,
                                probability = classification.probability,
                                band = ?classification.band,
                                "Candidate found"
                            );
                            match report.candidates.get_mut(&candidate.canonical) {
                                Some(existing) => existing.merge(candidate),
                                None => {
                                    report.candidates.insert(candidate.canonical.clone(), candidate);
                                }
                            }
                        }
                    }
                    Ok(_) => report.classified_negative += 1,
                }

                let mut queued = 0;
                for child in analysis.children {
                    if frontier.push(child) == Admission::Queued {
                        queued += 1;
                    }
                }
                debug!(url = %item.url, queued, "Links enqueued");
            }
        }
        report.visited.push(item);
    }
}

async fn process(ctx: Arc<WorkerContext>, mut item: FrontierItem) -> PageResult {
    let Some(_permit) = ctx.politeness.acquire(&item.url).await else {
        item.advance(FetchState::Failed);
        return PageResult {
            fetch: Err(FetchError::Connect {
                url: item.url.to_string(),
                reason: "politeness slot unavailable".to_string(),
            }),
            item,
        };
    };

    let (result, attempts) = fetch_with_retry(ctx.fetcher.as_ref(), &item.url, ctx.retry).await;
    item.attempts = attempts;

    match result {
        Err(e) => {
            item.advance(FetchState::Failed);
            PageResult { item, fetch: Err(e) }
        }
        Ok(page) => {
            item.advance(FetchState::Fetched);
            let (classification, reused) = classify_once(&ctx, &page);
            let children = if item.depth < ctx.config.max_depth && page.is_html() {
                outbound(&ctx, &item, &page)
            } else {
                vec![]
            };
            PageResult {
                item,
                fetch: Ok(Analysis {
                    classification,
                    reused,
                    page,
                    children,
                }),
            }
        }
    }
}

/// Classify a page unless the same final URL already produced this content.
fn classify_once(ctx: &WorkerContext, page: &FetchedPage) -> (Result<ClassificationResult, ClassifyError>, bool) {
    let key = (page.final_url.clone(), page.content_hash.clone());
    if let Some(previous) = ctx.classified.get(&key) {
        let mut result = previous.clone();
        result.url = page.url.clone();
        return (Ok(result), true);
    }
    let result = ctx.classifier.classify(page);
    if let Ok(classification) = &result {
        ctx.classified.insert(key, classification.clone());
    }
    (result, false)
}

/// Scored, capped child items for a page's links.
fn outbound(ctx: &WorkerContext, item: &FrontierItem, page: &FetchedPage) -> Vec<FrontierItem> {
    let document = Html::parse_document(&page.body);
    let links = html::links(&document, &page.final_url);
    ctx.scorer
        .select(links, ctx.config.relevancy_threshold, ctx.config.max_links_per_page)
        .into_iter()
        .map(|(link, score)| {
            let mut child = FrontierItem::child(item, link.url, score);
            child.sources = vec![DiscoverySource::Crawl];
            child
        })
        .collect()
}

fn candidate_for(
    item: &FrontierItem,
    page: &FetchedPage,
    classification: &ClassificationResult,
) -> Option<VerificationCandidate> {
    let canonical = CanonicalUrl::from_url(&page.final_url).ok()?;
    let probe_url = canonical.to_url().ok()?;
    let sources = if item.depth == 0 {
        item.sources.clone()
    } else {
        vec![DiscoverySource::Crawl]
    };
    Some(VerificationCandidate::new(canonical, probe_url, sources).with_probability(classification.probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockFetcher};
    use crate::types::{ClassifierConfig, RelevancyConfig};
    use std::time::Duration;
    use url::Url;

    fn seed(url: &str) -> Seed {
        let url = Url::parse(url).unwrap();
        let canonical = CanonicalUrl::from_url(&url).unwrap();
        Seed::new(url, canonical, DiscoverySource::StaticList)
    }

    fn crawler(fetcher: MockFetcher, config: CrawlConfig) -> SiteCrawler {
        SiteCrawler::new(
            Arc::new(fetcher),
            ContentClassifier::from_config(&ClassifierConfig::default()).unwrap(),
            LinkScorer::new(RelevancyConfig::default()),
            config.without_delay(),
        )
    }

    #[tokio::test]
    async fn test_finds_positive_site_and_follows_relevant_links() {
        let fetcher = MockFetcher::new()
            .with_page("https://hub.example/", &fixtures::hub_page(&["https://streams.tv/live/nba"]))
            .with_page("https://streams.tv/live/nba", fixtures::STREAM_PAGE);

        let report = crawler(fetcher, CrawlConfig::default())
            .run(&[seed("https://hub.example/")], &CancellationToken::new())
            .await;

        assert_eq!(report.termination, TerminationReason::Exhausted);
        assert_eq!(report.pages_crawled, 2);
        let key = CanonicalUrl::parse("https://streams.tv").unwrap();
        let candidate = report.candidates.get(&key).expect("candidate");
        assert_eq!(candidate.sources, vec![DiscoverySource::Crawl]);
        assert!(report
            .visited
            .iter()
            .all(|i| i.state == FetchState::Fetched));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_recorded_and_crawl_continues() {
        let fetcher = MockFetcher::new()
            .with_failures("https://down.tv/", 10, 503)
            .with_page("https://up.tv/", fixtures::STREAM_PAGE);
        let config = CrawlConfig {
            retry_times: 2,
            ..CrawlConfig::default()
        };

        let report = crawler(fetcher, config)
            .run(&[seed("https://down.tv/"), seed("https://up.tv/")], &CancellationToken::new())
            .await;

        assert_eq!(report.fetch_failures, 1);
        assert_eq!(report.pages_crawled, 1);
        let failed = report.visited.iter().find(|i| i.state == FetchState::Failed).unwrap();
        assert_eq!(failed.attempts, 3);
        assert_eq!(report.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_respects_page_limit() {
        let mut fetcher = MockFetcher::new();
        let links: Vec<String> = (0..80).map(|i| format!("https://site{i}.tv/live/stream")).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        fetcher = fetcher.with_page("https://hub.example/", &fixtures::hub_page(&link_refs));
        for link in &links {
            fetcher = fetcher.with_page(link, &fixtures::hub_page(&link_refs));
        }
        let config = CrawlConfig::default()
            .with_max_pages(50)
            .with_concurrency(8);
        let config = CrawlConfig {
            max_links_per_page: 80,
            ..config
        };

        let report = crawler(fetcher, config)
            .run(&[seed("https://hub.example/")], &CancellationToken::new())
            .await;

        assert_eq!(report.termination, TerminationReason::PageLimit);
        assert!(report.pages_crawled + report.fetch_failures <= 50);
        assert_eq!(report.visited.len(), 50);
    }

    #[tokio::test]
    async fn test_redirected_duplicate_reuses_classification() {
        let fetcher = MockFetcher::new()
            .with_page("https://streams.tv/", fixtures::STREAM_PAGE)
            .with_redirect("https://www.streams.tv/", "https://streams.tv/")
            .with_redirect("http://streams.tv/", "https://streams.tv/");

        let report = crawler(fetcher, CrawlConfig::default().with_max_depth(0).with_concurrency(1))
            .run(
                &[seed("https://www.streams.tv/"), seed("http://streams.tv/"), seed("https://streams.tv/")],
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report.pages_crawled, 3);
        assert_eq!(report.classified_positive, 3);
        assert_eq!(report.classifications_reused, 2);
        assert_eq!(report.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_crawl() {
        let fetcher = MockFetcher::new()
            .with_page("https://slow.tv/", fixtures::STREAM_PAGE)
            .with_delay(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let crawler = crawler(fetcher, CrawlConfig::default());

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(2), crawler.run(&[seed("https://slow.tv/")], &cancel))
            .await
            .expect("crawl should stop promptly");
        assert_eq!(report.termination, TerminationReason::Timeout);
        assert_eq!(report.pages_crawled, 0);
        assert!(report.candidates.is_empty());
    }
}

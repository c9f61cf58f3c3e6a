//! End-to-end discovery cycles against mock fetchers.
//!
//! These tests drive the full loop:
//! 1. Seed generation
//! 2. Crawl and classification
//! 3. Verification and lifecycle
//! 4. Enrichment and feedback

use std::sync::Arc;

use signal_scout::testing::{fixtures, MockEnricher, MockFetcher};
use signal_scout::{
    CanonicalUrl, CrawlConfig, DiscoverySource, MemoryRegistry, PermutationConfig, Registry, ScoutConfig,
    ScoutEngine, SeedConfig, SiteStatus, SqliteRegistry, TerminationReason,
};

/// Config with fast, deterministic crawling and the given static seeds.
fn config(static_urls: &[&str]) -> ScoutConfig {
    ScoutConfig::default()
        .with_seeds(SeedConfig::empty().with_static_urls(static_urls.iter().copied()))
        .with_crawl(CrawlConfig {
            retry_times: 0,
            ..CrawlConfig::default().without_delay()
        })
}

fn url(s: &str) -> CanonicalUrl {
    CanonicalUrl::parse(s).unwrap()
}

#[tokio::test]
async fn test_site_degrades_across_cycles_and_keeps_score() {
    let fetcher = Arc::new(MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE));
    let registry = Arc::new(MemoryRegistry::new());
    let engine = ScoutEngine::builder(config(&["https://streams.tv/"]))
        .fetcher(fetcher.clone())
        .registry(registry.clone())
        .build()
        .unwrap();

    engine.run_cycle().await.unwrap();
    let created = registry.get(&url("https://streams.tv")).await.unwrap().unwrap();
    assert_eq!(created.status, SiteStatus::Active);
    assert_eq!(created.failure_count, 0);
    assert!(created.confidence_score >= 50);

    // Site goes dark; the registry sweep picks it up.
    fetcher.remove_page("https://streams.tv/");

    let expected = [
        (SiteStatus::Quarantined, 1),
        (SiteStatus::Quarantined, 2),
        (SiteStatus::Inactive, 3),
    ];
    for (status, failures) in expected {
        engine.run_cycle().await.unwrap();
        let record = registry.get(&created.canonical_url).await.unwrap().unwrap();
        assert_eq!(record.status, status);
        assert_eq!(record.failure_count, failures);
        assert_eq!(record.confidence_score, created.confidence_score);
        assert!(record.last_verified_at >= created.last_verified_at);
    }

    // Inactive sites are not re-verified by default.
    let summary = engine.run_cycle().await.unwrap();
    assert_eq!(summary.verifications_attempted, 0);

    // Back online and rediscovered: reactivated with a fresh score.
    fetcher.set_page("https://streams.tv/", fixtures::STREAM_PAGE);
    let summary = engine.run_cycle().await.unwrap();
    assert_eq!(summary.sites_reactivated, 1);
    let record = registry.get(&created.canonical_url).await.unwrap().unwrap();
    assert_eq!(record.status, SiteStatus::Active);
    assert_eq!(record.failure_count, 0);
}

#[tokio::test]
async fn test_page_limit_bounds_crawl() {
    let links: Vec<String> = (0..80).map(|i| format!("https://site{i}.tv/live/stream")).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let hub = fixtures::hub_page(&link_refs);

    let mut fetcher = MockFetcher::new().with_page("https://hub.example/", &hub);
    for link in &links {
        fetcher = fetcher.with_page(link, &hub);
    }
    let fetcher = Arc::new(fetcher);

    let mut config = config(&["https://hub.example/"]);
    config.crawl.max_pages = 50;
    config.crawl.max_links_per_page = 80;
    config.crawl.concurrency = 8;

    let engine = ScoutEngine::builder(config)
        .fetcher(fetcher.clone())
        .build()
        .unwrap();
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.termination, TerminationReason::PageLimit);
    assert!(summary.pages_crawled + summary.fetch_failures <= 50);
    let crawled = fetcher
        .calls()
        .iter()
        .filter(|u| u.contains("/live/stream"))
        .count();
    assert!(crawled < 50, "crawled {crawled} linked pages");
}

#[tokio::test]
async fn test_enrichment_never_changes_status_or_score() {
    let pages = [
        ("https://streams.tv/", fixtures::STREAM_PAGE),
        ("https://blog.example/", fixtures::BLOG_PAGE),
    ];
    let seeds = ["https://streams.tv/", "https://blog.example/"];

    let mut snapshots = vec![];
    for enricher in [MockEnricher::unavailable(), MockEnricher::sports_streaming()] {
        let mut fetcher = MockFetcher::new();
        for (url, body) in pages {
            fetcher = fetcher.with_page(url, body);
        }
        let registry = Arc::new(MemoryRegistry::new());
        let engine = ScoutEngine::builder(config(&seeds))
            .fetcher(Arc::new(fetcher))
            .registry(registry.clone())
            .enricher(Arc::new(enricher))
            .build()
            .unwrap();
        engine.run_cycle().await.unwrap();
        engine.run_cycle().await.unwrap();

        let snapshot: Vec<_> = registry
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.canonical_url, r.status, r.confidence_score, r.failure_count))
            .collect();
        snapshots.push(snapshot);
    }

    assert!(!snapshots[0].is_empty());
    assert_eq!(snapshots[0], snapshots[1]);
}

#[tokio::test]
async fn test_same_content_gives_same_result() {
    let fetcher = Arc::new(MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE));
    let registry = Arc::new(MemoryRegistry::new());
    let engine = ScoutEngine::builder(config(&[]))
        .fetcher(fetcher)
        .registry(registry.clone())
        .build()
        .unwrap();

    let (first, _) = engine.verify_url("https://streams.tv").await.unwrap();
    let (second, _) = engine.verify_url("https://streams.tv/some/page").await.unwrap();
    assert_eq!(first.confidence, second.confidence);
    assert_eq!(first.passed, second.passed);

    let record = registry.get(&url("https://streams.tv")).await.unwrap().unwrap();
    assert_eq!(record.status, SiteStatus::Active);
    assert_eq!(record.confidence_score, second.confidence);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_site_found_by_many_routes_is_stored_once() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page("https://hub.example/", &fixtures::hub_page(&["https://streams.tv/watch/nba"]))
            .with_page("https://streams.tv/watch/nba", fixtures::STREAM_PAGE)
            .with_page("https://streams.tv/live", fixtures::STREAM_PAGE)
            .with_page("https://streams.tv/", fixtures::STREAM_PAGE),
    );
    let registry = Arc::new(MemoryRegistry::new());

    let mut seeds = SeedConfig::empty().with_static_urls(["https://hub.example/", "https://streams.tv/live"]);
    seeds.permutation = PermutationConfig {
        bases: vec!["streams".into()],
        tlds: vec![".tv".into()],
    };
    let config = config(&[]).with_seeds(seeds);

    let engine = ScoutEngine::builder(config)
        .fetcher(fetcher)
        .registry(registry.clone())
        .build()
        .unwrap();
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.sites_created, 1);
    let all = registry.list_all().await.unwrap();
    let streams: Vec<_> = all
        .iter()
        .filter(|r| r.canonical_url.as_str() == "https://streams.tv")
        .collect();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].discovery_source, DiscoverySource::StaticList);
}

#[tokio::test]
async fn test_cycle_against_sqlite_registry() {
    let fetcher = Arc::new(MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE));
    let registry = Arc::new(SqliteRegistry::in_memory().await.unwrap());
    let engine = ScoutEngine::builder(config(&["https://streams.tv/"]))
        .fetcher(fetcher)
        .registry(registry.clone())
        .build()
        .unwrap();

    let first = engine.run_cycle().await.unwrap();
    assert_eq!(first.sites_created, 1);

    // Second cycle: fed back from the registry and reconfirmed, not duplicated.
    let second = engine.run_cycle().await.unwrap();
    assert_eq!(second.sites_created, 0);
    assert_eq!(second.sites_reconfirmed, 1);
    assert_eq!(second.verifications_attempted, 1);

    let stats = engine.status().await.unwrap();
    assert_eq!((stats.total, stats.active), (1, 1));
}

/// Middling portal: 10 reachability + 17 content + 26 structure.
const MID_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Watch Live Stream</title></head>
<body>
  <div id="player"><video src="/feed"></video></div>
  <p>Tonight's feed starts at eight.</p>
</body>
</html>"#;

#[tokio::test]
async fn test_reconfirmation_does_not_inflate_score() {
    let fetcher = Arc::new(MockFetcher::new().with_page("https://midscore.tv/", MID_PAGE));
    let registry = Arc::new(MemoryRegistry::new());
    let mut config = config(&["https://midscore.tv/"]);
    config.classifier.ai_confidence_threshold = 0.0;

    let engine = ScoutEngine::builder(config)
        .fetcher(fetcher)
        .registry(registry.clone())
        .build()
        .unwrap();

    let site = url("https://midscore.tv");
    engine.run_cycle().await.unwrap();
    let first = registry.get(&site).await.unwrap().unwrap();
    assert_eq!(first.status, SiteStatus::Active);
    assert!(first.confidence_score < 95, "score {} leaves no room for a bonus", first.confidence_score);

    // Now seeded both from the static list and as feedback of the first confirmation.
    let summary = engine.run_cycle().await.unwrap();
    assert_eq!(summary.sites_reconfirmed, 1);
    let second = registry.get(&site).await.unwrap().unwrap();
    assert_eq!(second.confidence_score, first.confidence_score);
    assert_eq!(second.discovery_source, DiscoverySource::StaticList);
}

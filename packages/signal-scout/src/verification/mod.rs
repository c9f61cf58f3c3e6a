//! Multi-stage verification.
//!
//! 1. Reachability: the site root answers with a success status.
//! 2. Content analysis: keywords in title and meta description.
//! 3. Structural fingerprint: players, embeds, schedule markup.
//!
//! Stages 2 and 3 score the same fetched document on the blocking pool in
//! parallel. Raw stage scores (0..=100) are scaled to the configured
//! weights, a corroboration bonus is added, and the total is clamped to
//! [0, 100]. A stage that cannot be evaluated contributes 0.

pub mod content;
pub mod structure;

pub use content::analyze_content;
pub use structure::fingerprint_dom;

use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::html;
use crate::traits::fetcher::PageFetcher;
use crate::types::{
    FetchedPage, Stage, StageScores, VerificationCandidate, VerificationConfig, VerificationOutcome,
    VerificationWeights,
};

/// Raw result of one analysis stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// 0..=100 before weighting.
    pub raw: u32,
    pub indicators: Vec<String>,
}

/// Scale a raw 0..=100 stage score to `max` points, rounding to nearest.
pub fn scale(raw: u32, max: u32) -> u32 {
    raw.min(100).saturating_mul(max).saturating_add(50) / 100
}

/// Bonus points for a candidate.
pub fn bonus_points(candidate: &VerificationCandidate, weights: &VerificationWeights) -> u32 {
    let bonus = if candidate.corroboration() >= 2 {
        weights.corroboration_bonus
    } else {
        0
    };
    bonus.min(weights.max_bonus)
}

/// Runs the verification stages against live sites.
pub struct Verifier {
    fetcher: Arc<dyn PageFetcher>,
    config: VerificationConfig,
    summary_chars: usize,
}

impl Verifier {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: VerificationConfig, summary_chars: usize) -> Self {
        Self {
            fetcher,
            config,
            summary_chars,
        }
    }

    /// Verify one candidate. Never fails: problems lower the score.
    pub async fn verify(&self, candidate: &VerificationCandidate) -> VerificationOutcome {
        debug!(url = %candidate.canonical, "Verification starting");

        let page = match self
            .fetcher
            .fetch_with_timeout(&candidate.probe_url, self.config.request_timeout())
            .await
        {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                let outcome = VerificationOutcome::unreachable(
                    candidate.canonical.clone(),
                    format!("HTTP {}", page.status),
                );
                return self.log(outcome);
            }
            Err(e) => {
                let outcome = VerificationOutcome::unreachable(candidate.canonical.clone(), e.to_string());
                return self.log(outcome);
            }
        };

        let outcome = self.score_page(candidate, page).await;
        self.log(outcome)
    }

    /// Score an already-fetched, reachable page.
    pub async fn score_page(&self, candidate: &VerificationCandidate, page: FetchedPage) -> VerificationOutcome {
        let weights = self.config.weights;
        let mut failed_stages = vec![];
        let mut indicators = vec![format!("reachable_{}", page.status)];

        let (content, structural, title, summary) = if page.is_html() {
            let body: Arc<str> = Arc::from(page.body.as_str());
            let keywords = self.config.content_keywords.clone();
            let indicator_bonus = self.config.content_indicator_bonus;
            let summary_chars = self.summary_chars;

            let content_body = body.clone();
            let content_task = tokio::task::spawn_blocking(move || {
                let document = Html::parse_document(&content_body);
                let report = analyze_content(&document, &keywords, indicator_bonus);
                let title = html::title(&document);
                let summary = html::excerpt(&html::visible_text(&document), summary_chars);
                (report, title, summary)
            });
            let structure_body = body.clone();
            let structure_task =
                tokio::task::spawn_blocking(move || fingerprint_dom(&Html::parse_document(&structure_body)));

            let (content_result, structure_result) = tokio::join!(content_task, structure_task);

            let (content, title, summary) = match content_result {
                Ok(result) => (Some(result.0), result.1, result.2),
                Err(e) => {
                    warn!(url = %candidate.canonical, error = %e, "Content analysis stage failed");
                    (None, None, String::new())
                }
            };
            let structural = match structure_result {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(url = %candidate.canonical, error = %e, "Structural stage failed");
                    None
                }
            };
            (content, structural, title, summary)
        } else {
            (None, None, None, String::new())
        };

        let content_points = match content {
            Some(report) => {
                indicators.extend(report.indicators);
                scale(report.raw, weights.content_max)
            }
            None => {
                failed_stages.push(Stage::Content);
                0
            }
        };
        let structural_points = match structural {
            Some(report) => {
                indicators.extend(report.indicators);
                scale(report.raw, weights.structural_max)
            }
            None => {
                failed_stages.push(Stage::Structural);
                0
            }
        };

        let stages = StageScores {
            reachability: weights.reachability,
            content: content_points,
            structural: structural_points,
            bonus: bonus_points(candidate, &weights),
        };
        if stages.bonus > 0 {
            indicators.push(format!("corroborated_by_{}", candidate.corroboration()));
        }

        let mut outcome =
            VerificationOutcome::from_stage_points(candidate.canonical.clone(), stages, self.config.activation_threshold);
        outcome.failed_stages = failed_stages;
        outcome.indicators = indicators;
        outcome.title = title;
        outcome.content_summary = summary;
        outcome
    }

    fn log(&self, outcome: VerificationOutcome) -> VerificationOutcome {
        info!(
            url = %outcome.url,
            passed = outcome.passed,
            confidence = outcome.confidence,
            reachability = outcome.stages.reachability,
            content = outcome.stages.content,
            structural = outcome.stages.structural,
            bonus = outcome.stages.bonus,
            "Verification complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CanonicalUrl;
    use crate::testing::{fixtures, MockFetcher};
    use crate::types::DiscoverySource;
    use url::Url;

    fn candidate(url: &str, sources: Vec<DiscoverySource>) -> VerificationCandidate {
        let canonical = CanonicalUrl::parse(url).unwrap();
        let probe = canonical.to_url().unwrap();
        VerificationCandidate::new(canonical, probe, sources)
    }

    fn verifier(fetcher: MockFetcher) -> Verifier {
        Verifier::new(Arc::new(fetcher), VerificationConfig::default(), 2000)
    }

    #[test]
    fn test_scale_rounds() {
        assert_eq!(scale(100, 30), 30);
        assert_eq!(scale(0, 65), 0);
        assert_eq!(scale(50, 65), 33);
        assert_eq!(scale(250, 30), 30);
        assert_eq!(scale(100, u32::MAX), u32::MAX / 100);
    }

    #[test]
    fn test_bonus_requires_two_seed_strategies() {
        let weights = VerificationWeights::default();
        let single = candidate("https://a.tv", vec![DiscoverySource::Query, DiscoverySource::Crawl]);
        assert_eq!(bonus_points(&single, &weights), 0);
        let double = candidate("https://a.tv", vec![DiscoverySource::Query, DiscoverySource::Permutation]);
        assert_eq!(bonus_points(&double, &weights), 5);
        let fed_back = candidate("https://a.tv", vec![DiscoverySource::StaticList, DiscoverySource::RegistryFeedback]);
        assert_eq!(bonus_points(&fed_back, &weights), 0);

        let capped = VerificationWeights {
            corroboration_bonus: 20,
            max_bonus: 8,
            ..weights
        };
        assert_eq!(bonus_points(&double, &capped), 8);
    }

    #[tokio::test]
    async fn test_streaming_site_passes() {
        let fetcher = MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE);
        let outcome = verifier(fetcher)
            .verify(&candidate("https://streams.tv", vec![DiscoverySource::StaticList]))
            .await;

        assert!(outcome.passed, "confidence = {}", outcome.confidence);
        assert_eq!(outcome.stages.reachability, 10);
        assert!(outcome.stages.content <= 30);
        assert!(outcome.stages.structural <= 65);
        assert!(outcome.confidence <= 100);
        assert!(outcome.failed_stages.is_empty());
        assert!(!outcome.content_summary.is_empty());
    }

    #[tokio::test]
    async fn test_plain_site_fails_with_reachability_only() {
        let fetcher = MockFetcher::new().with_page("https://blog.example/", fixtures::BLOG_PAGE);
        let outcome = verifier(fetcher)
            .verify(&candidate("https://blog.example", vec![DiscoverySource::Query]))
            .await;

        assert!(!outcome.passed);
        assert_eq!(outcome.stages.reachability, 10);
        assert_eq!(outcome.stages.structural, 0);
        assert_eq!(outcome.confidence, 10);
    }

    #[tokio::test]
    async fn test_unreachable_site_scores_zero() {
        let outcome = verifier(MockFetcher::new())
            .verify(&candidate("https://gone.tv", vec![DiscoverySource::Query]))
            .await;
        assert!(!outcome.passed);
        assert_eq!(outcome.confidence, 0);
        assert_eq!(outcome.failed_stages.len(), 3);
    }

    #[tokio::test]
    async fn test_non_html_scores_reachability_only() {
        let fetcher = MockFetcher::new().with_typed_page("https://files.tv/", "%PDF-1.4", "application/pdf");
        let outcome = verifier(fetcher)
            .verify(&candidate("https://files.tv", vec![DiscoverySource::Query]))
            .await;
        assert_eq!(outcome.confidence, 10);
        assert_eq!(outcome.failed_stages, vec![Stage::Content, Stage::Structural]);
    }

    #[tokio::test]
    async fn test_summary_is_cut_to_configured_length() {
        let fetcher = MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE);
        let verifier = Verifier::new(Arc::new(fetcher), VerificationConfig::default(), 12);
        let outcome = verifier
            .verify(&candidate("https://streams.tv", vec![DiscoverySource::StaticList]))
            .await;
        assert_eq!(outcome.content_summary.chars().count(), 15);
        assert!(outcome.content_summary.ends_with("..."));
    }

    #[tokio::test]
    async fn test_verification_is_idempotent() {
        let fetcher = MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE);
        let verifier = verifier(fetcher);
        let c = candidate("https://streams.tv", vec![DiscoverySource::StaticList]);
        let a = verifier.verify(&c).await;
        let b = verifier.verify(&c).await;
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.passed, b.passed);
        assert_eq!(a.stages, b.stages);
    }

    #[test]
    fn test_probe_url_is_site_root() {
        let c = candidate("https://streams.tv/live/nba?x=1", vec![]);
        assert_eq!(c.probe_url, Url::parse("https://streams.tv/").unwrap());
    }
}

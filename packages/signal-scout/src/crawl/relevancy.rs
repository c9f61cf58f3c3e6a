//! Link relevancy scoring.
//!
//! Scores an outbound link in [0, 1] from its anchor text and URL so the
//! frontier follows likely targets first and skips boilerplate pages.

use crate::html::Link;
use crate::types::RelevancyConfig;

/// Scores links against the configured vocabularies.
#[derive(Debug, Clone)]
pub struct LinkScorer {
    config: RelevancyConfig,
}

impl LinkScorer {
    pub fn new(config: RelevancyConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|s| s.to_lowercase()).collect::<Vec<_>>();
        let config = RelevancyConfig {
            streaming_keywords: lower(&config.streaming_keywords),
            sports_keywords: lower(&config.sports_keywords),
            url_boost_keywords: lower(&config.url_boost_keywords),
            penalty_keywords: lower(&config.penalty_keywords),
            ..config
        };
        Self { config }
    }

    /// Relevancy of one link, clamped to [0, 1].
    pub fn score(&self, link: &Link) -> f32 {
        let c = &self.config;
        let text = link.text.to_lowercase();
        let url = link.url.as_str().to_lowercase();
        let mut score = 0.0f32;

        for keyword in &c.streaming_keywords {
            if text.contains(keyword.as_str()) {
                score += c.streaming_text_weight;
            }
            if url.contains(keyword.as_str()) {
                score += c.streaming_url_weight;
            }
        }
        for keyword in &c.sports_keywords {
            if text.contains(keyword.as_str()) {
                score += c.sports_text_weight;
            }
            if url.contains(keyword.as_str()) {
                score += c.sports_url_weight;
            }
        }
        if c.url_boost_keywords.iter().any(|k| url.contains(k.as_str())) {
            score += c.url_boost;
        }
        for keyword in &c.penalty_keywords {
            if url.contains(keyword.as_str()) || text.contains(keyword.as_str()) {
                score -= c.penalty;
            }
        }

        score.clamp(0.0, 1.0)
    }

    /// Links scoring at least `threshold`, best first, at most `limit`.
    ///
    /// Ties keep document order.
    pub fn select(&self, links: Vec<Link>, threshold: f32, limit: usize) -> Vec<(Link, f32)> {
        let mut scored: Vec<(Link, f32)> = links
            .into_iter()
            .map(|link| {
                let score = self.score(&link);
                (link, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        scored
    }
}

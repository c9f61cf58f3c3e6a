//! Classification and verification results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::canonical::CanonicalUrl;
use crate::types::site::{DiscoverySource, SiteStatus};

/// Binary classifier decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Positive,
    Negative,
}

/// Coarse band for logging a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceBand {
    pub fn from_probability(p: f32) -> Self {
        match p {
            p if p >= 0.9 => ConfidenceBand::VeryHigh,
            p if p >= 0.7 => ConfidenceBand::High,
            p if p >= 0.5 => ConfidenceBand::Medium,
            p if p >= 0.3 => ConfidenceBand::Low,
            _ => ConfidenceBand::VeryLow,
        }
    }
}

/// Output of the content classifier for one page. Logged, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub url: Url,
    /// In [0, 1].
    pub probability: f32,
    pub verdict: Verdict,
    pub band: ConfidenceBand,
    pub model_version: String,
    pub features: BTreeMap<String, f32>,
}

impl ClassificationResult {
    pub fn is_positive(&self) -> bool {
        self.verdict == Verdict::Positive
    }
}

/// A site queued for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCandidate {
    pub canonical: CanonicalUrl,
    /// URL the reachability probe requests (the site root).
    pub probe_url: Url,
    /// Every discovery strategy that produced this site.
    pub sources: Vec<DiscoverySource>,
    /// Best classifier probability seen for the site, if it came from a crawl.
    pub probability: Option<f32>,
}

impl VerificationCandidate {
    pub fn new(canonical: CanonicalUrl, probe_url: Url, sources: Vec<DiscoverySource>) -> Self {
        Self {
            canonical,
            probe_url,
            sources,
            probability: None,
        }
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = Some(probability);
        self
    }

    /// Source credited on a new record: the first seed strategy, falling
    /// back to whatever found the site.
    pub fn primary_source(&self) -> DiscoverySource {
        self.sources
            .iter()
            .copied()
            .find(DiscoverySource::is_independent)
            .or_else(|| self.sources.first().copied())
            .unwrap_or(DiscoverySource::Crawl)
    }

    /// Count of distinct independent strategies that produced this site.
    pub fn corroboration(&self) -> usize {
        let mut distinct: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.is_independent())
            .collect();
        distinct.sort();
        distinct.dedup();
        distinct.len()
    }

    /// Fold another candidate for the same site into this one.
    pub fn merge(&mut self, other: VerificationCandidate) {
        for source in other.sources {
            if !self.sources.contains(&source) {
                self.sources.push(source);
            }
        }
        self.probability = match (self.probability, other.probability) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Verification stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reachability,
    Content,
    Structural,
}

/// Points awarded per stage, already scaled to the configured weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageScores {
    pub reachability: u32,
    pub content: u32,
    pub structural: u32,
    pub bonus: u32,
}

impl StageScores {
    /// Sum of all stages, clamped to [0, 100].
    pub fn aggregate(&self) -> u32 {
        let sum = self.reachability as u64
            + self.content as u64
            + self.structural as u64
            + self.bonus as u64;
        sum.min(100) as u32
    }
}

/// Result of verifying one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub url: CanonicalUrl,
    pub stages: StageScores,
    /// Aggregate score in [0, 100].
    pub confidence: u32,
    pub passed: bool,
    /// Stages that could not be evaluated (scored 0).
    pub failed_stages: Vec<Stage>,
    /// Human-readable evidence.
    pub indicators: Vec<String>,
    pub title: Option<String>,
    /// Visible text excerpt handed to enrichment.
    pub content_summary: String,
    pub verified_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// Build an outcome from stage points and an activation threshold.
    pub fn from_stage_points(url: CanonicalUrl, stages: StageScores, activation_threshold: u32) -> Self {
        let confidence = stages.aggregate();
        Self {
            url,
            stages,
            confidence,
            passed: confidence >= activation_threshold,
            failed_stages: vec![],
            indicators: vec![],
            title: None,
            content_summary: String::new(),
            verified_at: Utc::now(),
        }
    }

    /// A candidate whose site could not be reached at all.
    pub fn unreachable(url: CanonicalUrl, reason: impl Into<String>) -> Self {
        let mut outcome = Self::from_stage_points(url, StageScores::default(), 1);
        outcome.passed = false;
        outcome.failed_stages = vec![Stage::Reachability, Stage::Content, Stage::Structural];
        outcome.indicators = vec![format!("unreachable: {}", reason.into())];
        outcome
    }
}

/// What the lifecycle manager did with an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// New URL passed; record created active.
    Created,
    /// Active record passed again.
    Reconfirmed,
    /// Quarantined or inactive record passed; back to active.
    Reactivated,
    /// Active record failed; now quarantined.
    Quarantined,
    /// Already quarantined (or inactive) record failed again.
    FailureRecorded,
    /// Failure count reached the limit; now inactive.
    Deactivated,
    /// New URL failed; nothing persisted.
    Ignored,
}

impl Transition {
    /// Whether the URL should feed the next cycle's seeds.
    pub fn feeds_back(&self) -> bool {
        matches!(
            self,
            Transition::Created | Transition::Reconfirmed | Transition::Reactivated
        )
    }

    /// Whether a registry write happened.
    pub fn is_write(&self) -> bool {
        !matches!(self, Transition::Ignored)
    }

    /// Status after this transition, if a record exists.
    pub fn resulting_status(&self) -> Option<SiteStatus> {
        match self {
            Transition::Created | Transition::Reconfirmed | Transition::Reactivated => {
                Some(SiteStatus::Active)
            }
            Transition::Quarantined => Some(SiteStatus::Quarantined),
            Transition::Deactivated => Some(SiteStatus::Inactive),
            Transition::FailureRecorded | Transition::Ignored => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> CanonicalUrl {
        CanonicalUrl::parse("https://a.tv").unwrap()
    }

    #[test]
    fn test_aggregate_is_clamped() {
        let stages = StageScores {
            reachability: 10,
            content: 30,
            structural: 65,
            bonus: 5,
        };
        assert_eq!(stages.aggregate(), 100);
    }

    #[test]
    fn test_from_stage_points_threshold() {
        let stages = StageScores {
            reachability: 10,
            content: 20,
            structural: 40,
            bonus: 0,
        };
        let outcome = VerificationOutcome::from_stage_points(url(), stages, 50);
        assert_eq!(outcome.confidence, 70);
        assert!(outcome.passed);

        let outcome = VerificationOutcome::from_stage_points(url(), stages, 71);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_unreachable_scores_zero() {
        let outcome = VerificationOutcome::unreachable(url(), "connection refused");
        assert_eq!(outcome.confidence, 0);
        assert!(!outcome.passed);
        assert_eq!(outcome.failed_stages.len(), 3);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceBand::from_probability(0.95), ConfidenceBand::VeryHigh);
        assert_eq!(ConfidenceBand::from_probability(0.7), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_probability(0.5), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_probability(0.3), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_probability(0.1), ConfidenceBand::VeryLow);
    }

    #[test]
    fn test_candidate_merge_and_corroboration() {
        let probe = Url::parse("https://a.tv/").unwrap();
        let mut a = VerificationCandidate::new(url(), probe.clone(), vec![DiscoverySource::Query])
            .with_probability(0.8);
        let b = VerificationCandidate::new(url(), probe, vec![DiscoverySource::Permutation, DiscoverySource::Registry])
            .with_probability(0.9);
        a.merge(b);
        assert_eq!(a.probability, Some(0.9));
        assert_eq!(a.corroboration(), 2);
    }

    #[test]
    fn test_earlier_confirmation_is_not_corroboration() {
        let probe = Url::parse("https://a.tv/").unwrap();
        let candidate = VerificationCandidate::new(
            url(),
            probe,
            vec![DiscoverySource::RegistryFeedback, DiscoverySource::StaticList, DiscoverySource::Crawl],
        );
        assert_eq!(candidate.corroboration(), 1);
        assert_eq!(candidate.primary_source(), DiscoverySource::StaticList);
    }

    #[test]
    fn test_feedback_transitions() {
        assert!(Transition::Created.feeds_back());
        assert!(Transition::Reactivated.feeds_back());
        assert!(!Transition::Quarantined.feeds_back());
        assert!(!Transition::Ignored.is_write());
    }
}

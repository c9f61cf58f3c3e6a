//! Registry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::canonical::CanonicalUrl;

/// Lifecycle status of a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    /// Passed its most recent verification.
    Active,
    /// Failed recently; still tracked and re-checked.
    Quarantined,
    /// Failed `max_failed_attempts` times in a row.
    Inactive,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Active => "active",
            SiteStatus::Quarantined => "quarantined",
            SiteStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SiteStatus::Active),
            "quarantined" => Ok(SiteStatus::Quarantined),
            "inactive" => Ok(SiteStatus::Inactive),
            other => Err(format!("unknown site status: {other}")),
        }
    }
}

/// Where a URL was first found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    Query,
    StaticList,
    Aggregator,
    Permutation,
    RegistryFeedback,
    /// Reached by following links from a seed.
    Crawl,
    /// Loaded from the registry for re-verification.
    Registry,
}

impl DiscoverySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoverySource::Query => "query",
            DiscoverySource::StaticList => "static_list",
            DiscoverySource::Aggregator => "aggregator",
            DiscoverySource::Permutation => "permutation",
            DiscoverySource::RegistryFeedback => "registry_feedback",
            DiscoverySource::Crawl => "crawl",
            DiscoverySource::Registry => "registry",
        }
    }

    /// Whether finding a site this way is evidence in its own right.
    ///
    /// Link-following, the registry sweep and feedback of earlier
    /// confirmations only echo what another route already found.
    pub fn is_independent(&self) -> bool {
        !matches!(
            self,
            DiscoverySource::Crawl | DiscoverySource::Registry | DiscoverySource::RegistryFeedback
        )
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoverySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(DiscoverySource::Query),
            "static_list" => Ok(DiscoverySource::StaticList),
            "aggregator" => Ok(DiscoverySource::Aggregator),
            "permutation" => Ok(DiscoverySource::Permutation),
            "registry_feedback" => Ok(DiscoverySource::RegistryFeedback),
            "crawl" => Ok(DiscoverySource::Crawl),
            "registry" => Ok(DiscoverySource::Registry),
            other => Err(format!("unknown discovery source: {other}")),
        }
    }
}

/// A persisted site in the registry.
///
/// Exactly one record exists per `canonical_url`. `status`,
/// `confidence_score` and `failure_count` only change through lifecycle
/// transitions; `category` and `reasoning` only through enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub canonical_url: CanonicalUrl,
    pub display_name: String,
    pub discovery_source: DiscoverySource,
    /// 0..=100
    pub confidence_score: u32,
    pub status: SiteStatus,
    pub failure_count: u32,
    pub last_verified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    pub reasoning: Option<String>,
    /// Optimistic concurrency counter, bumped on every write.
    pub version: i64,
}

impl SiteRecord {
    /// New active record for a URL that just passed verification.
    pub fn activated(
        canonical_url: CanonicalUrl,
        discovery_source: DiscoverySource,
        confidence_score: u32,
        verified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            display_name: canonical_url.display_name(),
            canonical_url,
            discovery_source,
            confidence_score: confidence_score.min(100),
            status: SiteStatus::Active,
            failure_count: 0,
            last_verified_at: verified_at,
            created_at: verified_at,
            category: None,
            reasoning: None,
            version: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SiteStatus::Active
    }
}

/// Registry counts for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub active: usize,
    pub quarantined: usize,
    pub inactive: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

impl RegistryStats {
    /// Tally stats from a full listing.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a SiteRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            match record.status {
                SiteStatus::Active => stats.active += 1,
                SiteStatus::Quarantined => stats.quarantined += 1,
                SiteStatus::Inactive => stats.inactive += 1,
            }
            stats.last_activity = stats.last_activity.max(Some(record.last_verified_at));
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [SiteStatus::Active, SiteStatus::Quarantined, SiteStatus::Inactive] {
            assert_eq!(status.as_str().parse::<SiteStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<SiteStatus>().is_err());
    }

    #[test]
    fn test_activated_record() {
        let url = CanonicalUrl::parse("https://www.streameast.app/nba").unwrap();
        let now = Utc::now();
        let record = SiteRecord::activated(url, DiscoverySource::Permutation, 120, now);
        assert_eq!(record.display_name, "Streameast");
        assert_eq!(record.confidence_score, 100);
        assert_eq!(record.failure_count, 0);
        assert!(record.is_active());
    }
}

//! Per-cycle summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why the crawl phase stopped dispatching fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// `max_pages` fetches were dispatched.
    PageLimit,
    /// The cycle's wall-clock budget ran out.
    Timeout,
    /// Nothing left to fetch.
    Exhausted,
}

/// Counters emitted at the end of every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub termination: TerminationReason,

    pub seeds_generated: usize,
    pub seed_strategy_failures: usize,

    pub pages_crawled: usize,
    pub fetch_failures: usize,
    pub classified_positive: usize,
    pub classified_negative: usize,
    pub classification_errors: usize,

    pub verifications_attempted: usize,
    pub verifications_passed: usize,
    /// Verifications dropped because the cycle was cancelled.
    pub verifications_cancelled: usize,

    pub registry_writes: usize,
    pub sites_created: usize,
    pub sites_reconfirmed: usize,
    pub sites_reactivated: usize,
    pub sites_quarantined: usize,
    pub sites_deactivated: usize,
    pub conflicts_abandoned: usize,

    pub enrichments_applied: usize,
    pub enrichments_unavailable: usize,

    pub feedback_seeds: usize,
}

impl CycleSummary {
    pub fn new(cycle_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            duration_ms: 0,
            termination: TerminationReason::Exhausted,
            seeds_generated: 0,
            seed_strategy_failures: 0,
            pages_crawled: 0,
            fetch_failures: 0,
            classified_positive: 0,
            classified_negative: 0,
            classification_errors: 0,
            verifications_attempted: 0,
            verifications_passed: 0,
            verifications_cancelled: 0,
            registry_writes: 0,
            sites_created: 0,
            sites_reconfirmed: 0,
            sites_reactivated: 0,
            sites_quarantined: 0,
            sites_deactivated: 0,
            conflicts_abandoned: 0,
            enrichments_applied: 0,
            enrichments_unavailable: 0,
            feedback_seeds: 0,
        }
    }
}

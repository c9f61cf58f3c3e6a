//! Lifecycle manager: the only writer of registry status and score.
//!
//! | current              | outcome | next                                   |
//! |----------------------|---------|----------------------------------------|
//! | none                 | pass    | active, failures 0                     |
//! | none                 | fail    | nothing persisted                      |
//! | active               | pass    | active (score and timestamp refreshed) |
//! | active               | fail    | quarantined, failures 1                |
//! | quarantined          | fail    | failures + 1; inactive at the limit    |
//! | inactive             | fail    | inactive, failures + 1                 |
//! | quarantined/inactive | pass    | active, failures 0                     |
//!
//! A failing verification keeps the last successful `confidence_score`;
//! degradation shows in `status` and `failure_count` only.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::canonical::CanonicalUrl;
use crate::error::{RegistryError, RegistryResult};
use crate::traits::enricher::Enrichment;
use crate::traits::registry::Registry;
use crate::types::{DiscoverySource, LifecycleConfig, SiteRecord, SiteStatus, Transition, VerificationOutcome};

/// Decide the next state of a record. Pure.
///
/// Returns the transition and the record to write (`None` for `Ignored`).
pub fn transition(
    current: Option<&SiteRecord>,
    outcome: &VerificationOutcome,
    source: DiscoverySource,
    max_failed_attempts: u32,
) -> (Transition, Option<SiteRecord>) {
    let Some(current) = current else {
        if outcome.passed {
            let record = SiteRecord::activated(outcome.url.clone(), source, outcome.confidence, outcome.verified_at);
            return (Transition::Created, Some(record));
        }
        return (Transition::Ignored, None);
    };

    let mut next = current.clone();
    next.last_verified_at = outcome.verified_at;

    let kind = match (current.status, outcome.passed) {
        (SiteStatus::Active, true) => {
            next.confidence_score = outcome.confidence;
            Transition::Reconfirmed
        }
        (SiteStatus::Quarantined | SiteStatus::Inactive, true) => {
            next.status = SiteStatus::Active;
            next.failure_count = 0;
            next.confidence_score = outcome.confidence;
            Transition::Reactivated
        }
        (SiteStatus::Active, false) => {
            next.status = SiteStatus::Quarantined;
            next.failure_count = 1;
            Transition::Quarantined
        }
        (SiteStatus::Quarantined, false) => {
            next.failure_count = current.failure_count.saturating_add(1);
            if next.failure_count >= max_failed_attempts {
                next.status = SiteStatus::Inactive;
                Transition::Deactivated
            } else {
                Transition::FailureRecorded
            }
        }
        (SiteStatus::Inactive, false) => {
            next.failure_count = current.failure_count.saturating_add(1);
            Transition::FailureRecorded
        }
    };

    (kind, Some(next))
}

/// Result of applying an outcome.
#[derive(Debug, Clone)]
pub struct Applied {
    pub transition: Transition,
    pub record: Option<SiteRecord>,
}

/// Applies verification outcomes to the registry.
///
/// Writes for one canonical URL are serialized through a per-URL lock;
/// writes for different URLs proceed independently. Persistence conflicts
/// are retried with backoff and then abandoned for the cycle.
pub struct LifecycleManager {
    registry: Arc<dyn Registry>,
    config: LifecycleConfig,
    locks: DashMap<CanonicalUrl, Arc<Mutex<()>>>,
}

impl LifecycleManager {
    pub fn new(registry: Arc<dyn Registry>, config: LifecycleConfig) -> Self {
        Self {
            registry,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    fn lock_for(&self, url: &CanonicalUrl) -> Arc<Mutex<()>> {
        self.locks
            .entry(url.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release(&self, url: &CanonicalUrl) {
        self.locks.remove_if(url, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.conflict_backoff_ms.saturating_mul(1 << attempt.min(10));
        Duration::from_millis(base + fastrand::u64(0..=self.config.conflict_backoff_ms))
    }

    /// Apply one verification outcome.
    ///
    /// Returns `Err(RegistryError::Conflict)` when the write was abandoned
    /// after exhausting retries.
    pub async fn apply(&self, outcome: &VerificationOutcome, source: DiscoverySource) -> RegistryResult<Applied> {
        let lock = self.lock_for(&outcome.url);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(outcome, source).await
        };
        drop(lock);
        self.release(&outcome.url);
        result
    }

    async fn apply_locked(&self, outcome: &VerificationOutcome, source: DiscoverySource) -> RegistryResult<Applied> {
        let mut attempt = 0;
        loop {
            match self.try_apply(outcome, source).await {
                Err(e) if e.is_conflict() && attempt < self.config.conflict_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    debug!(url = %outcome.url, attempt, delay_ms = delay.as_millis() as u64, "Persistence conflict, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_conflict() => {
                    warn!(url = %outcome.url, attempts = attempt + 1, "Abandoning registry update after repeated conflicts");
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    async fn try_apply(&self, outcome: &VerificationOutcome, source: DiscoverySource) -> RegistryResult<Applied> {
        let current = self.registry.get(&outcome.url).await?;
        let (kind, next) = transition(current.as_ref(), outcome, source, self.config.max_failed_attempts);

        let record = match (next, current) {
            (None, _) => None,
            (Some(record), None) => Some(self.registry.insert(record).await?),
            (Some(record), Some(current)) => Some(self.registry.update(record, current.version).await?),
        };

        match kind {
            Transition::Ignored => debug!(url = %outcome.url, confidence = outcome.confidence, "Unverified URL not persisted"),
            Transition::Reconfirmed | Transition::FailureRecorded => debug!(
                url = %outcome.url,
                transition = ?kind,
                confidence = outcome.confidence,
                "Registry record refreshed"
            ),
            _ => info!(
                url = %outcome.url,
                transition = ?kind,
                confidence = outcome.confidence,
                failure_count = record.as_ref().map(|r| r.failure_count).unwrap_or(0),
                "Registry record changed"
            ),
        }

        Ok(Applied {
            transition: kind,
            record,
        })
    }

    /// Attach enrichment to an existing record.
    ///
    /// Only `category` and `reasoning` are written. Returns whether
    /// anything was applied.
    pub async fn annotate(&self, url: &CanonicalUrl, enrichment: &Enrichment) -> RegistryResult<bool> {
        let Enrichment::Enriched {
            category,
            reasoning,
            ..
        } = enrichment
        else {
            return Ok(false);
        };

        let lock = self.lock_for(url);
        let result = {
            let _guard = lock.lock().await;
            match self
                .registry
                .annotate(url, Some(category.clone()), Some(reasoning.clone()))
                .await
            {
                Ok(()) => Ok(true),
                // Nothing to annotate when the URL never made it into the registry.
                Err(RegistryError::NotFound { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        };
        drop(lock);
        self.release(url);
        result
    }
}

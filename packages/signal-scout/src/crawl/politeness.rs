//! Per-domain politeness: a minimum delay with jitter between requests to
//! the same domain, and a cap on concurrent requests per domain.

use dashmap::DashMap;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Jitter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::canonical::domain_key;
use crate::types::CrawlConfig;

type DomainLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Held while a request to a domain is in flight.
pub struct DomainPermit {
    _permit: OwnedSemaphorePermit,
}

/// Shared politeness state for one crawl.
pub struct Politeness {
    limiter: Option<DomainLimiter>,
    jitter: Duration,
    slots: DashMap<String, Arc<Semaphore>>,
    per_domain: usize,
}

impl Politeness {
    pub fn new(config: &CrawlConfig) -> Self {
        // `with_period` rejects a zero period; no delay means no limiter.
        let limiter = Quota::with_period(config.download_delay()).map(RateLimiter::keyed);
        Self {
            limiter,
            jitter: config.jitter(),
            slots: DashMap::new(),
            per_domain: config.concurrency_per_domain.max(1),
        }
    }

    /// Wait for a per-domain slot and for the domain's delay to elapse.
    ///
    /// Returns `None` only if the domain's semaphore was closed.
    pub async fn acquire(&self, url: &Url) -> Option<DomainPermit> {
        let domain = domain_key(url);
        let slot = self
            .slots
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_domain)))
            .clone();

        let permit = slot.acquire_owned().await.ok()?;

        if let Some(limiter) = &self.limiter {
            if self.jitter.is_zero() {
                limiter.until_key_ready(&domain).await;
            } else {
                limiter
                    .until_key_ready_with_jitter(&domain, Jitter::up_to(self.jitter))
                    .await;
            }
        }

        Some(DomainPermit { _permit: permit })
    }

    /// Domains seen so far.
    pub fn domains(&self) -> usize {
        self.slots.len()
    }
}

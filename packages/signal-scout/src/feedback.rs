//! Feedback loop: confirmed sites become next cycle's seeds.

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::canonical::CanonicalUrl;
use crate::traits::registry::Registry;
use crate::types::{FeedbackConfig, SiteStatus, Transition};

/// Carries confirmed sites from one cycle into the next.
#[derive(Debug)]
pub struct FeedbackCoordinator {
    config: FeedbackConfig,
    pending: Vec<CanonicalUrl>,
    bootstrapped: bool,
}

impl FeedbackCoordinator {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            pending: vec![],
            bootstrapped: false,
        }
    }

    /// Take the feedback seeds for the cycle about to start.
    ///
    /// On the first call the set is bootstrapped from the registry's most
    /// recently verified active sites, so a restarted process keeps feeding
    /// itself.
    pub async fn take_seeds(&mut self, registry: &dyn Registry) -> Vec<CanonicalUrl> {
        if !self.bootstrapped {
            self.bootstrapped = true;
            if self.config.bootstrap_from_registry && self.pending.is_empty() {
                match registry
                    .list_by_status(SiteStatus::Active, self.config.max_feedback_seeds)
                    .await
                {
                    Ok(records) => {
                        self.pending = records.into_iter().map(|r| r.canonical_url).collect();
                        info!(seeds = self.pending.len(), "Bootstrapped feedback from registry");
                    }
                    Err(e) => warn!(error = %e, "Could not bootstrap feedback from registry"),
                }
            }
        }
        std::mem::take(&mut self.pending)
    }

    /// Record this cycle's lifecycle transitions. Returns how many seeds
    /// were queued for the next cycle.
    pub fn record<'a>(&mut self, transitions: impl IntoIterator<Item = (&'a CanonicalUrl, Transition)>) -> usize {
        self.pending = select(transitions, self.config.max_feedback_seeds);
        debug!(seeds = self.pending.len(), "Feedback seeds queued");
        self.pending.len()
    }
}

/// Confirmed URLs in first-seen order, deduplicated and capped.
pub fn select<'a>(
    transitions: impl IntoIterator<Item = (&'a CanonicalUrl, Transition)>,
    cap: usize,
) -> Vec<CanonicalUrl> {
    let mut selected = IndexSet::new();
    for (url, transition) in transitions {
        if selected.len() >= cap {
            break;
        }
        if transition.feeds_back() {
            selected.insert(url.clone());
        }
    }
    selected.into_iter().collect()
}

//! Cycle orchestration.
//!
//! One cycle runs the pipeline once:
//!
//! ```text
//! feedback + config -> seeds -> crawl -> classify -> candidates
//!     (+ registry sweep) -> verify -> lifecycle -> enrich -> feedback
//! ```
//!
//! The cycle timeout cancels new fetch and verification dispatch. Results
//! that arrive after cancellation are dropped and never reach the
//! registry.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::canonical::CanonicalUrl;
use crate::classifier::ContentClassifier;
use crate::crawl::{LinkScorer, SiteCrawler};
use crate::error::Result;
use crate::feedback::FeedbackCoordinator;
use crate::fetchers::HttpFetcher;
use crate::lifecycle::{Applied, LifecycleManager};
use crate::seeds::SeedGenerator;
use crate::stores::MemoryRegistry;
use crate::traits::enricher::{DisabledEnricher, Enricher, EnrichmentRequest};
use crate::traits::fetcher::PageFetcher;
use crate::traits::registry::Registry;
use crate::traits::searcher::WebSearcher;
use crate::types::{
    CycleSummary, DiscoverySource, RegistryStats, ScoutConfig, SiteRecord, SiteStatus, Transition,
    VerificationCandidate, VerificationOutcome,
};
use crate::verification::Verifier;

/// Builder for [`ScoutEngine`].
///
/// Anything not supplied falls back to the production default: HTTP
/// fetcher, in-memory registry, no search backend, enrichment disabled.
pub struct ScoutEngineBuilder {
    config: ScoutConfig,
    fetcher: Option<Arc<dyn PageFetcher>>,
    registry: Option<Arc<dyn Registry>>,
    searcher: Option<Arc<dyn WebSearcher>>,
    enricher: Option<Arc<dyn Enricher>>,
    reports_dir: Option<PathBuf>,
}

impl ScoutEngineBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    pub fn enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Write a JSON report per cycle into `dir`.
    pub fn reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<ScoutEngine> {
        let config = self.config;
        config.validate()?;

        let fetcher: Arc<dyn PageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&config.crawl)?),
        };
        let registry: Arc<dyn Registry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(MemoryRegistry::new()),
        };
        let enricher: Arc<dyn Enricher> = match self.enricher {
            Some(enricher) => enricher,
            None => Arc::new(DisabledEnricher),
        };

        let mut seeds = SeedGenerator::new(config.seeds.clone(), fetcher.clone());
        if let Some(searcher) = self.searcher {
            seeds = seeds.with_searcher(searcher);
        }

        let crawler = SiteCrawler::new(
            fetcher.clone(),
            ContentClassifier::from_config(&config.classifier)?,
            LinkScorer::new(config.relevancy.clone()),
            config.crawl.clone(),
        );
        let verifier = Verifier::new(
            fetcher,
            config.verification.clone(),
            config.enrichment.max_content_chars,
        );
        let lifecycle = LifecycleManager::new(registry, config.lifecycle.clone());
        let feedback = FeedbackCoordinator::new(config.feedback.clone());

        Ok(ScoutEngine {
            config,
            seeds,
            crawler,
            verifier: Arc::new(verifier),
            lifecycle: Arc::new(lifecycle),
            enricher,
            feedback: Mutex::new(feedback),
            reports_dir: self.reports_dir,
        })
    }
}

/// The discovery engine.
pub struct ScoutEngine {
    config: ScoutConfig,
    seeds: SeedGenerator,
    crawler: SiteCrawler,
    verifier: Arc<Verifier>,
    lifecycle: Arc<LifecycleManager>,
    enricher: Arc<dyn Enricher>,
    feedback: Mutex<FeedbackCoordinator>,
    reports_dir: Option<PathBuf>,
}

/// A verified candidate and what the lifecycle manager did with it.
struct Committed {
    outcome: VerificationOutcome,
    applied: Applied,
}

impl ScoutEngine {
    pub fn builder(config: ScoutConfig) -> ScoutEngineBuilder {
        ScoutEngineBuilder {
            config,
            fetcher: None,
            registry: None,
            searcher: None,
            enricher: None,
            reports_dir: None,
        }
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        self.lifecycle.registry()
    }

    /// Registry counts by status.
    pub async fn status(&self) -> Result<RegistryStats> {
        Ok(self.registry().stats().await?)
    }

    /// Verify a single URL now and apply the result.
    pub async fn verify_url(&self, raw: &str) -> Result<(VerificationOutcome, Transition)> {
        let canonical = CanonicalUrl::parse(raw)?;
        let probe_url = canonical.to_url()?;
        let candidate = VerificationCandidate::new(canonical, probe_url, vec![DiscoverySource::StaticList]);
        let outcome = self.verifier.verify(&candidate).await;
        let applied = self.lifecycle.apply(&outcome, candidate.primary_source()).await?;
        Ok((outcome, applied.transition))
    }

    /// Run one discovery cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", cycle_id = %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> Result<CycleSummary> {
        let started = Instant::now();
        let mut summary = CycleSummary::new(cycle_id, Utc::now());
        info!(timeout_secs = self.config.engine.cycle_timeout_secs, "Cycle starting");

        let cancel = CancellationToken::new();
        let timer = tokio::spawn({
            let cancel = cancel.clone();
            let timeout = self.config.engine.cycle_timeout();
            async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Cycle timeout reached, cancelling dispatch");
                cancel.cancel();
            }
        });

        // Seeds
        let feedback_seeds = self.feedback.lock().await.take_seeds(self.registry().as_ref()).await;
        let batch = self.seeds.generate(&feedback_seeds).await;
        summary.seeds_generated = batch.len();
        summary.seed_strategy_failures = batch.failures.len();

        // Crawl and classify
        let report = self.crawler.run(&batch.seeds, &cancel).await;
        summary.termination = report.termination;
        summary.pages_crawled = report.pages_crawled;
        summary.fetch_failures = report.fetch_failures;
        summary.classified_positive = report.classified_positive;
        summary.classified_negative = report.classified_negative;
        summary.classification_errors = report.classification_errors;

        let mut candidates = report.candidates;
        self.add_sweep(&mut candidates).await;

        // Verify and commit
        let committed = self.verify_and_commit(candidates, &cancel, &mut summary).await;

        // Enrich
        self.enrich(&committed, &mut summary).await;

        // Feed back
        summary.feedback_seeds = self
            .feedback
            .lock()
            .await
            .record(committed.iter().map(|c| (&c.outcome.url, c.applied.transition)));

        timer.abort();
        summary.duration_ms = started.elapsed().as_millis() as u64;
        log_summary(&summary);
        if let Some(dir) = &self.reports_dir {
            if let Err(e) = write_report(dir, &summary).await {
                warn!(dir = %dir.display(), error = %e, "Failed to write cycle report");
            }
        }

        Ok(summary)
    }

    /// Add existing registry records due for re-verification.
    ///
    /// Least recently verified first, capped per cycle. Records already
    /// found by the crawl are not queued twice.
    async fn add_sweep(&self, candidates: &mut IndexMap<CanonicalUrl, VerificationCandidate>) {
        let lifecycle = &self.config.lifecycle;
        let mut due: Vec<SiteRecord> = match self.registry().list_all().await {
            Ok(records) => records
                .into_iter()
                .filter(|r| r.status != SiteStatus::Inactive || lifecycle.recheck_inactive)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Registry sweep skipped");
                return;
            }
        };
        due.sort_by(|a, b| {
            a.last_verified_at
                .cmp(&b.last_verified_at)
                .then_with(|| a.canonical_url.cmp(&b.canonical_url))
        });
        due.truncate(lifecycle.max_reverifications_per_cycle);

        let mut added = 0;
        for record in due {
            let Ok(probe_url) = record.canonical_url.to_url() else {
                continue;
            };
            let sweep = VerificationCandidate::new(record.canonical_url.clone(), probe_url, vec![DiscoverySource::Registry]);
            match candidates.get_mut(&record.canonical_url) {
                Some(existing) => existing.merge(sweep),
                None => {
                    candidates.insert(record.canonical_url, sweep);
                    added += 1;
                }
            }
        }
        debug!(added, total = candidates.len(), "Registry sweep queued");
    }

    async fn verify_and_commit(
        &self,
        candidates: IndexMap<CanonicalUrl, VerificationCandidate>,
        cancel: &CancellationToken,
        summary: &mut CycleSummary,
    ) -> Vec<Committed> {
        let total = candidates.len();
        info!(candidates = total, "Verification starting");

        let verifier = self.verifier.clone();
        let cancel_dispatch = cancel.clone();
        let mut results = stream::iter(candidates.into_values())
            .take_while(move |_| futures::future::ready(!cancel_dispatch.is_cancelled()))
            .map(move |candidate| {
                let verifier = verifier.clone();
                async move {
                    let outcome = verifier.verify(&candidate).await;
                    (candidate, outcome)
                }
            })
            .buffer_unordered(self.config.engine.max_concurrent_verifications.max(1));

        let mut committed = vec![];
        let mut completed = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = results.next() => next,
            };
            let Some((candidate, outcome)) = next else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }
            completed += 1;
            summary.verifications_attempted += 1;
            if outcome.passed {
                summary.verifications_passed += 1;
            }

            match self.lifecycle.apply(&outcome, candidate.primary_source()).await {
                Ok(applied) => {
                    count_transition(summary, applied.transition);
                    committed.push(Committed { outcome, applied });
                }
                Err(e) if e.is_conflict() => summary.conflicts_abandoned += 1,
                Err(e) => error!(url = %outcome.url, error = %e, "Registry write failed"),
            }
        }

        summary.verifications_cancelled = total - completed;
        if summary.verifications_cancelled > 0 {
            warn!(
                cancelled = summary.verifications_cancelled,
                "Verification cut short by cycle timeout"
            );
        }
        committed
    }

    /// Enrich committed records that passed or came close.
    ///
    /// Runs after every lifecycle decision of the cycle; results only
    /// annotate records.
    async fn enrich(&self, committed: &[Committed], summary: &mut CycleSummary) {
        let borderline = self.config.verification.borderline_threshold;
        let requests: Vec<EnrichmentRequest> = committed
            .iter()
            .filter(|c| c.applied.record.is_some())
            .filter(|c| c.outcome.passed || c.outcome.confidence >= borderline)
            .map(|c| EnrichmentRequest {
                url: c.outcome.url.clone(),
                title: c.outcome.title.clone(),
                content_summary: c.outcome.content_summary.clone(),
            })
            .collect();
        if requests.is_empty() {
            return;
        }

        let enricher = self.enricher.clone();
        let mut results = stream::iter(requests)
            .map(move |request| {
                let enricher = enricher.clone();
                async move {
                    let enrichment = enricher.enrich(&request).await;
                    (request.url, enrichment)
                }
            })
            .buffer_unordered(self.config.engine.max_concurrent_verifications.max(1));

        while let Some((url, enrichment)) = results.next().await {
            if !enrichment.is_available() {
                summary.enrichments_unavailable += 1;
                continue;
            }
            match self.lifecycle.annotate(&url, &enrichment).await {
                Ok(true) => summary.enrichments_applied += 1,
                Ok(false) => {}
                Err(e) => warn!(url = %url, error = %e, "Failed to store enrichment"),
            }
        }
    }
}

fn count_transition(summary: &mut CycleSummary, transition: Transition) {
    if transition.is_write() {
        summary.registry_writes += 1;
    }
    match transition {
        Transition::Created => summary.sites_created += 1,
        Transition::Reconfirmed => summary.sites_reconfirmed += 1,
        Transition::Reactivated => summary.sites_reactivated += 1,
        Transition::Quarantined => summary.sites_quarantined += 1,
        Transition::Deactivated => summary.sites_deactivated += 1,
        Transition::FailureRecorded | Transition::Ignored => {}
    }
}

fn log_summary(summary: &CycleSummary) {
    info!(
        termination = ?summary.termination,
        duration_ms = summary.duration_ms,
        seeds = summary.seeds_generated,
        pages_crawled = summary.pages_crawled,
        classified_positive = summary.classified_positive,
        classified_negative = summary.classified_negative,
        verifications = summary.verifications_attempted,
        passed = summary.verifications_passed,
        cancelled = summary.verifications_cancelled,
        registry_writes = summary.registry_writes,
        created = summary.sites_created,
        quarantined = summary.sites_quarantined,
        deactivated = summary.sites_deactivated,
        conflicts_abandoned = summary.conflicts_abandoned,
        enrichments = summary.enrichments_applied,
        feedback_seeds = summary.feedback_seeds,
        "Cycle complete"
    );
}

async fn write_report(dir: &std::path::Path, summary: &CycleSummary) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!(
        "cycle-{}-{}.json",
        summary.started_at.format("%Y%m%dT%H%M%SZ"),
        summary.cycle_id
    ));
    let json = serde_json::to_vec_pretty(summary)?;
    tokio::fs::write(&path, json).await?;
    debug!(path = %path.display(), "Cycle report written");
    Ok(path)
}

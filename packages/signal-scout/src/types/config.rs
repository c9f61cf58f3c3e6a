//! Configuration types for the scout.
//!
//! Every field has a default so a partial JSON file (or none at all) yields
//! a working configuration. Secrets never live here; they come from the
//! environment.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ScoutError};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Complete scout configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub seeds: SeedConfig,
    pub crawl: CrawlConfig,
    pub relevancy: RelevancyConfig,
    pub classifier: ClassifierConfig,
    pub verification: VerificationConfig,
    pub lifecycle: LifecycleConfig,
    pub feedback: FeedbackConfig,
    pub enrichment: EnrichmentConfig,
    pub engine: EngineConfig,
}

impl ScoutConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. Missing sections and fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a cycle meaningless.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(ScoutError::Config {
                reason: reason.to_string(),
            })
        };
        if self.crawl.concurrency == 0 || self.crawl.concurrency_per_domain == 0 {
            return invalid("crawl concurrency must be > 0");
        }
        if self.engine.max_concurrent_verifications == 0 {
            return invalid("max_concurrent_verifications must be > 0");
        }
        if !(0.0..=1.0).contains(&self.classifier.ai_confidence_threshold) {
            return invalid("ai_confidence_threshold must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.crawl.relevancy_threshold) {
            return invalid("relevancy_threshold must be within [0, 1]");
        }
        if self.verification.activation_threshold > 100 {
            return invalid("activation_threshold must be within [0, 100]");
        }
        let weights = &self.verification.weights;
        let points = [
            weights.reachability,
            weights.content_max,
            weights.structural_max,
            weights.corroboration_bonus,
            weights.max_bonus,
            self.verification.content_indicator_bonus,
        ];
        if points.iter().chain(self.verification.content_keywords.values()).any(|&p| p > 100) {
            return invalid("verification weights must be within [0, 100]");
        }
        if self.lifecycle.max_failed_attempts == 0 {
            return invalid("max_failed_attempts must be > 0");
        }
        Ok(())
    }

    pub fn with_crawl(mut self, crawl: CrawlConfig) -> Self {
        self.crawl = crawl;
        self
    }

    pub fn with_seeds(mut self, seeds: SeedConfig) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Seed generation strategies and their inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Search queries sent to the web search backend.
    pub queries: Vec<String>,

    /// Results requested per query. Default: 10.
    pub results_per_query: usize,

    /// Fixed seed URLs.
    pub static_urls: Vec<String>,

    /// Curated listing pages whose outbound links become seeds.
    pub aggregator_urls: Vec<String>,

    /// An aggregator link is kept only if its domain contains one of these.
    pub aggregator_keywords: Vec<String>,

    /// Domain permutation inputs.
    pub permutation: PermutationConfig,

    /// Seeds on these domains (or their subdomains) are dropped.
    pub excluded_domains: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            queries: strings(&[
                "watch live sports free online",
                "nba live stream free",
                "nfl stream online hd",
                "soccer live streaming free",
            ]),
            results_per_query: 10,
            static_urls: vec![],
            aggregator_urls: vec![],
            aggregator_keywords: strings(&[
                "stream", "watch", "movie", "tv", "sport", "live", "free", "online", "hd",
                "east", "surge", "cast",
            ]),
            permutation: PermutationConfig::default(),
            excluded_domains: strings(&[
                "google.com",
                "bing.com",
                "yahoo.com",
                "duckduckgo.com",
                "facebook.com",
                "twitter.com",
                "x.com",
                "youtube.com",
                "instagram.com",
                "reddit.com",
                "wikipedia.org",
                "github.com",
                "discord.com",
                "t.me",
            ]),
        }
    }
}

impl SeedConfig {
    pub fn with_static_urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.static_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_queries(mut self, queries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.queries = queries.into_iter().map(Into::into).collect();
        self
    }

    /// Disable every strategy that needs configuration input.
    pub fn empty() -> Self {
        Self {
            queries: vec![],
            static_urls: vec![],
            aggregator_urls: vec![],
            permutation: PermutationConfig {
                bases: vec![],
                tlds: vec![],
            },
            ..Self::default()
        }
    }
}

/// Known brand bases combined with candidate TLDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutationConfig {
    pub bases: Vec<String>,
    pub tlds: Vec<String>,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            bases: strings(&["streameast", "sportssurge", "freestreams", "watchseries", "moviehd"]),
            tlds: strings(&[
                ".app", ".io", ".live", ".gg", ".net", ".org", ".tv", ".me", ".co", ".cc",
            ]),
        }
    }
}

/// Crawl frontier limits and politeness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum link depth from a seed. Default: 3.
    pub max_depth: usize,

    /// Maximum pages fetched per cycle. Default: 100.
    pub max_pages: usize,

    /// Maximum pages fetched per domain per cycle. Default: 20.
    pub max_pages_per_domain: usize,

    /// Concurrent fetches across all domains. Default: 5.
    pub concurrency: usize,

    /// Concurrent fetches against one domain. Default: 2.
    pub concurrency_per_domain: usize,

    /// Minimum delay between requests to the same domain. Default: 1000ms.
    pub download_delay_ms: u64,

    /// Random extra delay added on top of `download_delay_ms`. Default: 500ms.
    pub jitter_ms: u64,

    /// Per-request timeout. Default: 10s.
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt. Default: 2.
    pub retry_times: u32,

    /// Base delay for exponential retry backoff. Default: 500ms.
    pub retry_backoff_ms: u64,

    /// Links scoring below this are not enqueued. Default: 0.6.
    pub relevancy_threshold: f32,

    /// Links enqueued per page, best first. Default: 10.
    pub max_links_per_page: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            max_pages_per_domain: 20,
            concurrency: 5,
            concurrency_per_domain: 2,
            download_delay_ms: 1000,
            jitter_ms: 500,
            request_timeout_secs: 10,
            retry_times: 2,
            retry_backoff_ms: 500,
            relevancy_threshold: 0.6,
            max_links_per_page: 10,
            user_agent: "Mozilla/5.0 (compatible; SignalScout/0.1)".to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max: usize) -> Self {
        self.max_pages = max;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages_per_domain(mut self, max: usize) -> Self {
        self.max_pages_per_domain = max;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Remove all politeness delays (tests, local fixtures).
    pub fn without_delay(mut self) -> Self {
        self.download_delay_ms = 0;
        self.jitter_ms = 0;
        self.retry_backoff_ms = 0;
        self
    }

    pub fn with_relevancy_threshold(mut self, threshold: f32) -> Self {
        self.relevancy_threshold = threshold;
        self
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Vocabularies for link relevancy scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevancyConfig {
    pub streaming_keywords: Vec<String>,
    pub sports_keywords: Vec<String>,
    /// Small extra boost when one of these appears in the URL.
    pub url_boost_keywords: Vec<String>,
    /// Each hit subtracts `penalty` (boilerplate pages).
    pub penalty_keywords: Vec<String>,
    pub streaming_text_weight: f32,
    pub streaming_url_weight: f32,
    pub sports_text_weight: f32,
    pub sports_url_weight: f32,
    pub url_boost: f32,
    pub penalty: f32,
}

impl Default for RelevancyConfig {
    fn default() -> Self {
        Self {
            streaming_keywords: strings(&["live", "stream", "watch", "tv", "video", "player", "free"]),
            sports_keywords: strings(&[
                "nfl", "nba", "nhl", "mlb", "soccer", "football", "basketball", "sports",
            ]),
            url_boost_keywords: strings(&["live", "stream", "watch"]),
            penalty_keywords: strings(&["privacy", "terms", "contact", "about", "dmca", "legal"]),
            streaming_text_weight: 0.3,
            streaming_url_weight: 0.2,
            sports_text_weight: 0.2,
            sports_url_weight: 0.15,
            url_boost: 0.1,
            penalty: 0.5,
        }
    }
}

/// Content classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// JSON model artifact. `None` uses the built-in baseline model.
    pub model_path: Option<PathBuf>,

    /// Positive verdict threshold. Default: 0.7.
    pub ai_confidence_threshold: f32,

    /// Target-profile keywords used for density features.
    pub target_keywords: Vec<String>,

    /// Markers of embedded streaming players in scripts and markup.
    pub streaming_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            ai_confidence_threshold: 0.7,
            target_keywords: strings(&[
                "live", "stream", "watch", "sports", "nfl", "nba", "nhl", "mlb", "soccer",
                "football", "basketball", "hockey", "baseball", "game", "match", "schedule",
            ]),
            streaming_markers: strings(&[
                "stream", "player", "embed", "live", "hls", "m3u8", "rtmp", "dash",
            ]),
        }
    }
}

/// Point allocation per verification stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationWeights {
    /// Points for a successful response. Default: 10.
    pub reachability: u32,
    /// Maximum content-analysis points. Default: 30.
    pub content_max: u32,
    /// Maximum structural-fingerprint points. Default: 65.
    pub structural_max: u32,
    /// Points when two or more discovery sources agree. Default: 5.
    pub corroboration_bonus: u32,
    /// Cap on all bonus points. Default: 5.
    pub max_bonus: u32,
}

impl Default for VerificationWeights {
    fn default() -> Self {
        Self {
            reachability: 10,
            content_max: 30,
            structural_max: 65,
            corroboration_bonus: 5,
            max_bonus: 5,
        }
    }
}

/// Verification engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub weights: VerificationWeights,

    /// Minimum aggregate score to pass. Default: 50.
    pub activation_threshold: u32,

    /// Outcomes at or above this (but failing) are still enriched. Default: 40.
    pub borderline_threshold: u32,

    /// Per-request timeout for the reachability probe. Default: 5s.
    pub request_timeout_secs: u64,

    /// Content keyword weights applied to title and meta description.
    pub content_keywords: IndexMap<String, u32>,

    /// Bonus when more than three content keywords match. Default: 10.
    pub content_indicator_bonus: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        let content_keywords = [
            ("stream", 20),
            ("watch", 20),
            ("live", 15),
            ("movie", 15),
            ("tv", 15),
            ("sport", 15),
            ("free", 10),
            ("online", 10),
            ("hd", 5),
            ("video", 10),
            ("player", 10),
            ("schedule", 15),
            ("games", 10),
            ("nfl", 10),
            ("nba", 10),
            ("soccer", 10),
            ("football", 10),
        ]
        .into_iter()
        .map(|(k, w)| (k.to_string(), w))
        .collect();

        Self {
            weights: VerificationWeights::default(),
            activation_threshold: 50,
            borderline_threshold: 40,
            request_timeout_secs: 5,
            content_keywords,
            content_indicator_bonus: 10,
        }
    }
}

impl VerificationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Lifecycle and registry write policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Consecutive failures before a record becomes inactive. Default: 3.
    pub max_failed_attempts: u32,

    /// Retries after a persistence conflict. Default: 3.
    pub conflict_retries: u32,

    /// Base backoff between conflict retries. Default: 50ms.
    pub conflict_backoff_ms: u64,

    /// Existing records re-verified per cycle. Default: 100.
    pub max_reverifications_per_cycle: usize,

    /// Also re-verify inactive records in the sweep. Default: false.
    pub recheck_inactive: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 3,
            conflict_retries: 3,
            conflict_backoff_ms: 50,
            max_reverifications_per_cycle: 100,
            recheck_inactive: false,
        }
    }
}

/// Feedback loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Cap on seeds fed into the next cycle. Default: 25.
    pub max_feedback_seeds: usize,

    /// Seed the first cycle from the registry's active records. Default: true.
    pub bootstrap_from_registry: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            max_feedback_seeds: 25,
            bootstrap_from_registry: true,
        }
    }
}

/// Cognitive enrichment (OpenAI-compatible chat endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Page text is truncated to this many characters. Default: 2000.
    pub max_content_chars: usize,
    /// Categories the service may choose from.
    pub categories: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            timeout_secs: 30,
            max_tokens: 500,
            temperature: 0.1,
            max_content_chars: 2000,
            categories: strings(&[
                "Sports Streaming",
                "General Streaming",
                "Sports News",
                "General News",
                "E-commerce",
                "Social Media",
                "Other",
            ]),
        }
    }
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cycle-level limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock budget for one cycle. Default: 300s.
    pub cycle_timeout_secs: u64,

    /// Concurrent verifications. Default: 10.
    pub max_concurrent_verifications: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_timeout_secs: 300,
            max_concurrent_verifications: 10,
        }
    }
}

impl EngineConfig {
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout_secs = timeout.as_secs().max(1);
        self
    }
}

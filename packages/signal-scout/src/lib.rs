//! Autonomous Streaming Site Discovery
//!
//! Finds, verifies and tracks live streaming sites in a persistent
//! registry. Each cycle generates seeds, crawls from them, classifies the
//! pages it fetches, verifies candidate sites in stages, and applies the
//! results to the registry through a small lifecycle state machine.
//! Confirmed sites are fed back as seeds for the next cycle.
//!
//! # Design Philosophy
//!
//! - The registry is the only shared mutable state; everything else is
//!   per cycle.
//! - Verification never fails a cycle. Problems lower a site's score.
//! - Enrichment is advisory: it annotates records and never decides
//!   status or score.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use signal_scout::{ScoutConfig, ScoutEngine, SqliteRegistry};
//!
//! let registry = Arc::new(SqliteRegistry::new("sqlite://scout.db?mode=rwc").await?);
//! let engine = ScoutEngine::builder(ScoutConfig::default())
//!     .registry(registry)
//!     .build()?;
//!
//! let summary = engine.run_cycle().await?;
//! println!("{} sites created", summary.sites_created);
//! ```
//!
//! # Testing
//!
//! ```rust,ignore
//! use signal_scout::testing::{fixtures, MockFetcher};
//!
//! let fetcher = MockFetcher::new().with_page("https://streams.tv/", fixtures::STREAM_PAGE);
//! let engine = ScoutEngine::builder(config).fetcher(Arc::new(fetcher)).build()?;
//! ```

pub mod canonical;
pub mod classifier;
pub mod crawl;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod feedback;
pub mod fetchers;
pub mod html;
pub mod lifecycle;
pub mod security;
pub mod seeds;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod verification;

// Re-export core types at crate root
pub use canonical::CanonicalUrl;
pub use classifier::{ContentClassifier, LinearModel};
pub use crawl::{CrawlReport, SiteCrawler};
pub use engine::{ScoutEngine, ScoutEngineBuilder};
pub use enrichment::OpenAiEnricher;
pub use error::{ClassifyError, EnrichError, FetchError, RegistryError, Result, ScoutError, SearchError};
pub use feedback::FeedbackCoordinator;
pub use fetchers::HttpFetcher;
pub use lifecycle::{transition, Applied, LifecycleManager};
pub use security::ApiKey;
pub use seeds::{SeedBatch, SeedGenerator, SeedStrategy, TavilySearcher};
pub use stores::{MemoryRegistry, SqliteRegistry};
pub use traits::{
    enricher::{DisabledEnricher, Enricher, Enrichment, EnrichmentRequest},
    fetcher::PageFetcher,
    registry::Registry,
    searcher::{SearchResult, WebSearcher},
};
pub use types::*;
pub use verification::Verifier;

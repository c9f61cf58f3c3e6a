//! Cognitive enrichment seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalUrl;

/// What the enrichment service is asked about.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentRequest {
    pub url: CanonicalUrl,
    pub title: Option<String>,
    pub content_summary: String,
}

/// Enrichment result. Advisory only: it annotates a record and never
/// decides its status or score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Enrichment {
    Enriched {
        service_name: String,
        category: String,
        reasoning: String,
        is_target: bool,
    },
    Unavailable,
}

impl Enrichment {
    pub fn is_available(&self) -> bool {
        matches!(self, Enrichment::Enriched { .. })
    }
}

/// Categorizes verified sites.
///
/// Implementations absorb every failure (timeout, transport, malformed
/// response) and return `Enrichment::Unavailable`.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, request: &EnrichmentRequest) -> Enrichment;
}

/// Enricher used when enrichment is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEnricher;

#[async_trait]
impl Enricher for DisabledEnricher {
    async fn enrich(&self, _request: &EnrichmentRequest) -> Enrichment {
        Enrichment::Unavailable
    }
}

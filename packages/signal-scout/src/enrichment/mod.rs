//! Cognitive enrichment backends.

pub mod openai;

pub use openai::OpenAiEnricher;

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::security::ApiKey;
use crate::traits::enricher::{DisabledEnricher, Enricher};
use crate::types::EnrichmentConfig;

/// Build the enricher for a configuration.
///
/// A disabled configuration yields an enricher that always returns
/// `Unavailable`.
pub fn from_config(config: &EnrichmentConfig, api_key: Option<ApiKey>) -> Result<Arc<dyn Enricher>> {
    if !config.enabled {
        info!("Enrichment disabled");
        return Ok(Arc::new(DisabledEnricher));
    }
    info!(base_url = %config.base_url, model = %config.model, "Enrichment enabled");
    Ok(Arc::new(OpenAiEnricher::new(config.clone(), api_key)?))
}

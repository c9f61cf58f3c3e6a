use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use signal_scout::{ApiKey, ScoutConfig};

/// Process settings loaded from environment variables
#[derive(Debug)]
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub database_url: String,
    pub tavily_api_key: Option<ApiKey>,
    pub enrichment_api_key: Option<ApiKey>,
    pub enrichment_base_url: Option<String>,
    pub reports_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            config_path: non_empty("SCOUT_CONFIG").map(PathBuf::from),
            database_url: non_empty("SCOUT_DATABASE_URL")
                .unwrap_or_else(|| "sqlite://scout.db?mode=rwc".to_string()),
            tavily_api_key: ApiKey::from_env("tavily", "TAVILY_API_KEY"),
            enrichment_api_key: ApiKey::from_env("enrichment", "ENRICHMENT_API_KEY"),
            enrichment_base_url: non_empty("ENRICHMENT_BASE_URL"),
            reports_dir: non_empty("SCOUT_REPORTS_DIR").map(PathBuf::from),
        })
    }

    /// Load the scout configuration, applying environment overrides.
    pub fn scout_config(&self) -> Result<ScoutConfig> {
        let mut config = match &self.config_path {
            Some(path) => ScoutConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ScoutConfig::default(),
        };
        if let Some(base_url) = &self.enrichment_base_url {
            config.enrichment.base_url = base_url.clone();
        }
        Ok(config)
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

//! In-memory registry for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::canonical::CanonicalUrl;
use crate::error::{RegistryError, RegistryResult};
use crate::traits::registry::Registry;
use crate::types::{SiteRecord, SiteStatus};

/// In-memory registry. Data is lost on restart.
#[derive(Default)]
pub struct MemoryRegistry {
    sites: RwLock<HashMap<CanonicalUrl, SiteRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sites.read().await.is_empty()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get(&self, url: &CanonicalUrl) -> RegistryResult<Option<SiteRecord>> {
        Ok(self.sites.read().await.get(url).cloned())
    }

    async fn insert(&self, mut record: SiteRecord) -> RegistryResult<SiteRecord> {
        let mut sites = self.sites.write().await;
        if sites.contains_key(&record.canonical_url) {
            return Err(RegistryError::Conflict {
                url: record.canonical_url.to_string(),
            });
        }
        record.version = 1;
        sites.insert(record.canonical_url.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, mut record: SiteRecord, expected_version: i64) -> RegistryResult<SiteRecord> {
        let mut sites = self.sites.write().await;
        let stored = sites
            .get_mut(&record.canonical_url)
            .ok_or_else(|| RegistryError::NotFound {
                url: record.canonical_url.to_string(),
            })?;
        if stored.version != expected_version {
            return Err(RegistryError::Conflict {
                url: record.canonical_url.to_string(),
            });
        }
        record.version = expected_version + 1;
        *stored = record.clone();
        Ok(record)
    }

    async fn annotate(
        &self,
        url: &CanonicalUrl,
        category: Option<String>,
        reasoning: Option<String>,
    ) -> RegistryResult<()> {
        let mut sites = self.sites.write().await;
        let stored = sites.get_mut(url).ok_or_else(|| RegistryError::NotFound {
            url: url.to_string(),
        })?;
        stored.category = category;
        stored.reasoning = reasoning;
        stored.version += 1;
        Ok(())
    }

    async fn list_by_status(&self, status: SiteStatus, limit: usize) -> RegistryResult<Vec<SiteRecord>> {
        let sites = self.sites.read().await;
        let mut records: Vec<_> = sites.values().filter(|r| r.status == status).cloned().collect();
        records.sort_by(|a, b| {
            b.last_verified_at
                .cmp(&a.last_verified_at)
                .then_with(|| a.canonical_url.cmp(&b.canonical_url))
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn list_all(&self) -> RegistryResult<Vec<SiteRecord>> {
        let sites = self.sites.read().await;
        let mut records: Vec<_> = sites.values().cloned().collect();
        records.sort_by(|a, b| a.canonical_url.cmp(&b.canonical_url));
        Ok(records)
    }
}

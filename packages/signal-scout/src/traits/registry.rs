//! Site registry storage.

use async_trait::async_trait;

use crate::canonical::CanonicalUrl;
use crate::error::RegistryResult;
use crate::types::{RegistryStats, SiteRecord, SiteStatus};

/// Persistent store of `SiteRecord`s keyed by canonical URL.
///
/// Writes use optimistic concurrency: `update` succeeds only when the
/// stored `version` equals `expected_version`, and bumps it. `insert`
/// fails with `Conflict` if the URL already exists.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get(&self, url: &CanonicalUrl) -> RegistryResult<Option<SiteRecord>>;

    /// Insert a new record. Returns the stored record (version 1).
    async fn insert(&self, record: SiteRecord) -> RegistryResult<SiteRecord>;

    /// Replace an existing record if its version still matches.
    async fn update(&self, record: SiteRecord, expected_version: i64) -> RegistryResult<SiteRecord>;

    /// Write enrichment fields only. Never touches status or score.
    async fn annotate(
        &self,
        url: &CanonicalUrl,
        category: Option<String>,
        reasoning: Option<String>,
    ) -> RegistryResult<()>;

    /// Records with the given status, most recently verified first.
    async fn list_by_status(&self, status: SiteStatus, limit: usize) -> RegistryResult<Vec<SiteRecord>>;

    /// Every record, ordered by canonical URL.
    async fn list_all(&self) -> RegistryResult<Vec<SiteRecord>>;

    async fn stats(&self) -> RegistryResult<RegistryStats> {
        let records = self.list_all().await?;
        Ok(RegistryStats::from_records(&records))
    }
}

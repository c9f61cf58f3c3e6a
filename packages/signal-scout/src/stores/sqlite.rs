//! SQLite registry.
//!
//! The `sites` table is the integration contract with monitoring tools;
//! columns mirror `SiteRecord`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::canonical::CanonicalUrl;
use crate::error::{RegistryError, RegistryResult};
use crate::traits::registry::Registry;
use crate::types::{SiteRecord, SiteStatus};

fn storage(e: impl std::error::Error + Send + Sync + 'static) -> RegistryError {
    RegistryError::Storage(Box::new(e))
}

fn corrupt(reason: String) -> RegistryError {
    RegistryError::Storage(reason.into())
}

/// SQLite-backed registry.
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Connect and run migrations.
    ///
    /// # Example URLs
    /// - `sqlite://scout.db?mode=rwc` - File-based, created if missing
    /// - `sqlite::memory:` - Ephemeral (use `in_memory`)
    pub async fn new(database_url: &str) -> RegistryResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(storage)?;
        let registry = Self { pool };
        registry.run_migrations().await?;
        Ok(registry)
    }

    /// Ephemeral registry on a single connection (for testing).
    pub async fn in_memory() -> RegistryResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage)?;
        let registry = Self { pool };
        registry.run_migrations().await?;
        Ok(registry)
    }

    async fn run_migrations(&self) -> RegistryResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                canonical_url TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                discovery_source TEXT NOT NULL,
                confidence_score INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active',
                failure_count INTEGER NOT NULL DEFAULT 0,
                last_verified_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                category TEXT,
                reasoning TEXT,
                version INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_sites_status ON sites(status);
            CREATE INDEX IF NOT EXISTS idx_sites_last_verified ON sites(last_verified_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn exists(&self, url: &CanonicalUrl) -> RegistryResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sites WHERE canonical_url = ?")
            .bind(url.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.is_some())
    }
}

#[derive(Debug, FromRow)]
struct SiteRow {
    canonical_url: String,
    display_name: String,
    discovery_source: String,
    confidence_score: i64,
    status: String,
    failure_count: i64,
    last_verified_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    category: Option<String>,
    reasoning: Option<String>,
    version: i64,
}

impl TryFrom<SiteRow> for SiteRecord {
    type Error = RegistryError;

    fn try_from(row: SiteRow) -> Result<Self, Self::Error> {
        Ok(SiteRecord {
            canonical_url: CanonicalUrl::parse(&row.canonical_url).map_err(|e| corrupt(e.to_string()))?,
            display_name: row.display_name,
            discovery_source: row.discovery_source.parse().map_err(corrupt)?,
            confidence_score: row.confidence_score.clamp(0, 100) as u32,
            status: row.status.parse().map_err(corrupt)?,
            failure_count: row.failure_count.max(0) as u32,
            last_verified_at: row.last_verified_at,
            created_at: row.created_at,
            category: row.category,
            reasoning: row.reasoning,
            version: row.version,
        })
    }
}

const SELECT_SITE: &str = "SELECT canonical_url, display_name, discovery_source, confidence_score, status, \
     failure_count, last_verified_at, created_at, category, reasoning, version FROM sites";

fn into_records(rows: Vec<SiteRow>) -> RegistryResult<Vec<SiteRecord>> {
    rows.into_iter().map(SiteRecord::try_from).collect()
}

#[async_trait]
impl Registry for SqliteRegistry {
    async fn get(&self, url: &CanonicalUrl) -> RegistryResult<Option<SiteRecord>> {
        let row: Option<SiteRow> = sqlx::query_as(&format!("{SELECT_SITE} WHERE canonical_url = ?"))
            .bind(url.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(SiteRecord::try_from).transpose()
    }

    async fn insert(&self, mut record: SiteRecord) -> RegistryResult<SiteRecord> {
        record.version = 1;
        let result = sqlx::query(
            r#"
            INSERT INTO sites (canonical_url, display_name, discovery_source, confidence_score, status,
                               failure_count, last_verified_at, created_at, category, reasoning, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.canonical_url.as_str())
        .bind(&record.display_name)
        .bind(record.discovery_source.as_str())
        .bind(record.confidence_score as i64)
        .bind(record.status.as_str())
        .bind(record.failure_count as i64)
        .bind(record.last_verified_at)
        .bind(record.created_at)
        .bind(&record.category)
        .bind(&record.reasoning)
        .bind(record.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(RegistryError::Conflict {
                url: record.canonical_url.to_string(),
            }),
            Err(e) => Err(storage(e)),
        }
    }

    async fn update(&self, mut record: SiteRecord, expected_version: i64) -> RegistryResult<SiteRecord> {
        let result = sqlx::query(
            r#"
            UPDATE sites
            SET display_name = ?, discovery_source = ?, confidence_score = ?, status = ?,
                failure_count = ?, last_verified_at = ?, category = ?, reasoning = ?,
                version = version + 1
            WHERE canonical_url = ? AND version = ?
            "#,
        )
        .bind(&record.display_name)
        .bind(record.discovery_source.as_str())
        .bind(record.confidence_score as i64)
        .bind(record.status.as_str())
        .bind(record.failure_count as i64)
        .bind(record.last_verified_at)
        .bind(&record.category)
        .bind(&record.reasoning)
        .bind(record.canonical_url.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(if self.exists(&record.canonical_url).await? {
                RegistryError::Conflict {
                    url: record.canonical_url.to_string(),
                }
            } else {
                RegistryError::NotFound {
                    url: record.canonical_url.to_string(),
                }
            });
        }
        record.version = expected_version + 1;
        Ok(record)
    }

    async fn annotate(
        &self,
        url: &CanonicalUrl,
        category: Option<String>,
        reasoning: Option<String>,
    ) -> RegistryResult<()> {
        let result = sqlx::query(
            "UPDATE sites SET category = ?, reasoning = ?, version = version + 1 WHERE canonical_url = ?",
        )
        .bind(category)
        .bind(reasoning)
        .bind(url.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound { url: url.to_string() });
        }
        Ok(())
    }

    async fn list_by_status(&self, status: SiteStatus, limit: usize) -> RegistryResult<Vec<SiteRecord>> {
        let rows: Vec<SiteRow> = sqlx::query_as(&format!(
            "{SELECT_SITE} WHERE status = ? ORDER BY last_verified_at DESC, canonical_url ASC LIMIT ?"
        ))
        .bind(status.as_str())
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        into_records(rows)
    }

    async fn list_all(&self) -> RegistryResult<Vec<SiteRecord>> {
        let rows: Vec<SiteRow> = sqlx::query_as(&format!("{SELECT_SITE} ORDER BY canonical_url ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        into_records(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiscoverySource;

    fn record(url: &str) -> SiteRecord {
        SiteRecord::activated(
            CanonicalUrl::parse(url).unwrap(),
            DiscoverySource::Permutation,
            70,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let stored = registry.insert(record("https://streameast.app")).await.unwrap();
        let loaded = registry.get(&stored.canonical_url).await.unwrap().unwrap();
        assert_eq!(loaded.display_name, "Streameast");
        assert_eq!(loaded.discovery_source, DiscoverySource::Permutation);
        assert_eq!(loaded.confidence_score, 70);
        assert_eq!(loaded.status, SiteStatus::Active);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        registry.insert(record("https://a.tv")).await.unwrap();
        let err = registry.insert(record("https://a.tv")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_stale_update_is_conflict() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let stored = registry.insert(record("https://a.tv")).await.unwrap();

        let mut quarantined = stored.clone();
        quarantined.status = SiteStatus::Quarantined;
        quarantined.failure_count = 1;
        let updated = registry.update(quarantined.clone(), 1).await.unwrap();
        assert_eq!(updated.version, 2);

        assert!(registry.update(quarantined, 1).await.unwrap_err().is_conflict());

        let missing = record("https://missing.tv");
        assert!(matches!(
            registry.update(missing, 1).await.unwrap_err(),
            RegistryError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let a = registry.insert(record("https://a.tv")).await.unwrap();
        registry.insert(record("https://b.tv")).await.unwrap();
        let mut inactive = a.clone();
        inactive.status = SiteStatus::Inactive;
        registry.update(inactive, a.version).await.unwrap();

        assert_eq!(registry.list_by_status(SiteStatus::Active, 10).await.unwrap().len(), 1);
        let stats = registry.stats().await.unwrap();
        assert_eq!((stats.total, stats.active, stats.inactive), (2, 1, 1));
    }
}

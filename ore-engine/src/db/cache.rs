//! Durable cache store over the `cache_entries` table

use crate::cache::{CacheCategory, CacheStore, StoredEntry};
use async_trait::async_trait;
use ore_common::Result;
use sqlx::{Row, SqlitePool};

pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete entries of `category` cached before `cutoff`
    pub async fn purge_older_than(&self, category: CacheCategory, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE category = ? AND cached_at < ?")
            .bind(category.as_str())
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load(&self, category: CacheCategory, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query(
            "SELECT payload, cached_at FROM cache_entries WHERE category = ? AND cache_key = ?",
        )
        .bind(category.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                let cached_at: String = row.get("cached_at");
                Ok(Some(StoredEntry {
                    payload: crate::db::from_json("payload", &payload)?,
                    cached_at: crate::models::parse_timestamp("cached_at", &cached_at)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, category: CacheCategory, key: &str, entry: StoredEntry) -> Result<()> {
        let payload = crate::db::to_json("payload", &entry.payload)?;
        sqlx::query(
            r#"
            INSERT INTO cache_entries (category, cache_key, payload, cached_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(category, cache_key) DO UPDATE SET
                payload = excluded.payload,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(category.as_str())
        .bind(key)
        .bind(payload)
        .bind(entry.cached_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, category: CacheCategory, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE category = ? AND cache_key = ?")
            .bind(category.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

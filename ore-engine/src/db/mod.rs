//! Database access for ore-engine
//!
//! One SQLite file, opened in WAL mode. Tables are created idempotently at pool
//! init; every write is an upsert keyed by primary key or normalized identity.

pub mod cache;
pub mod jobs;
pub mod owners;
pub mod properties;
pub mod settings;

pub use cache::SqliteCacheStore;

use ore_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Milliseconds SQLite waits on a held lock before reporting "database is locked"
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Open (creating if needed) the engine database
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
        .execute(&pool)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create all engine tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    const SCHEMA: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS owners (
            id TEXT PRIMARY KEY,
            owner_type TEXT NOT NULL,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            aka_names TEXT NOT NULL DEFAULT '[]',
            primary_address TEXT,
            mailing_address TEXT,
            jurisdiction TEXT,
            company_domain TEXT,
            risk_flags TEXT NOT NULL DEFAULT '[]',
            seller_intent_score INTEGER,
            contact_confidence INTEGER,
            demographics TEXT,
            type_verified INTEGER NOT NULL DEFAULT 0,
            source TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_owners_name_key ON owners(name_key)",
        r#"
        CREATE TABLE IF NOT EXISTS properties (
            id TEXT PRIMARY KEY,
            identity_key TEXT NOT NULL UNIQUE,
            owner_id TEXT,
            parcel_id TEXT,
            address TEXT NOT NULL,
            property_type TEXT,
            beds INTEGER,
            baths REAL,
            sqft INTEGER,
            year_built INTEGER,
            assessed_value INTEGER,
            estimated_value INTEGER,
            last_sale_date TEXT,
            last_sale_price INTEGER,
            source TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_properties_owner ON properties(owner_id)",
        r#"
        CREATE TABLE IF NOT EXISTS contact_info (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            value TEXT NOT NULL,
            normalized_value TEXT NOT NULL,
            source TEXT NOT NULL,
            confidence INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(owner_id, kind, normalized_value)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS legal_events (
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            property_id TEXT,
            kind TEXT NOT NULL,
            external_ref TEXT NOT NULL UNIQUE,
            filed_on TEXT,
            amount REAL,
            description TEXT,
            recorded_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS owner_llc_links (
            individual_id TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            relationship TEXT NOT NULL,
            confidence INTEGER NOT NULL,
            rationale TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (individual_id, entity_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            category TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            payload TEXT NOT NULL,
            cached_at TEXT NOT NULL,
            PRIMARY KEY (category, cache_key)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS bulk_jobs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            total_targets INTEGER NOT NULL,
            processed_targets INTEGER NOT NULL DEFAULT 0,
            enriched_contacts INTEGER NOT NULL DEFAULT 0,
            error_count INTEGER NOT NULL DEFAULT 0,
            reveal_status TEXT NOT NULL,
            deep_research_status TEXT NOT NULL,
            config TEXT NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            finished_at TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS bulk_targets (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            company TEXT NOT NULL,
            domain TEXT,
            location TEXT,
            status TEXT NOT NULL,
            error TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_bulk_targets_job ON bulk_targets(job_id, position)",
        r#"
        CREATE TABLE IF NOT EXISTS bulk_results (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            person_name TEXT NOT NULL,
            person_key TEXT NOT NULL,
            title TEXT,
            company TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            confidence INTEGER NOT NULL,
            intent_score INTEGER NOT NULL,
            providers TEXT NOT NULL DEFAULT '[]',
            handle TEXT,
            outreach_rationale TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(target_id, person_key)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_bulk_results_job ON bulk_results(job_id)",
    ];

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database tables initialized");
    Ok(())
}

/// Lock-wait budget for retried writes (settings override, else default)
pub async fn max_lock_wait_ms(pool: &SqlitePool) -> u64 {
    settings::get_setting::<u64>(pool, settings::MAX_LOCK_WAIT_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or(crate::utils::DEFAULT_MAX_LOCK_WAIT_MS)
}

/// Serialize a value into a TEXT column
pub(crate) fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| ore_common::Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}

/// Deserialize a TEXT column
pub(crate) fn from_json<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| ore_common::Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Fresh database in a temp dir (keep the dir alive for the pool's lifetime)
    pub async fn temp_pool() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_database_pool(&dir.path().join("ore.db")).await.unwrap();
        (dir, pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (_dir, pool) = test_support::temp_pool().await;
        init_tables(&pool).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "bulk_jobs",
            "bulk_results",
            "bulk_targets",
            "cache_entries",
            "contact_info",
            "legal_events",
            "owner_llc_links",
            "owners",
            "properties",
            "settings",
        ] {
            assert!(names.contains(&expected), "missing table {}", expected);
        }
    }
}

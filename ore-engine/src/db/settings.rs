//! Key-value settings table
//!
//! Provider API keys live here under `api_key.<provider>` so they can be set
//! at runtime without touching the TOML file.

use ore_common::{Error, Result};
use sqlx::SqlitePool;

/// Setting key holding the write lock-wait budget in milliseconds
pub const MAX_LOCK_WAIT_KEY: &str = "database_max_lock_wait_ms";

fn api_key_setting(provider: &str) -> String {
    format!("api_key.{}", provider)
}

/// Provider API key stored in the database
pub async fn get_api_key(db: &SqlitePool, provider: &str) -> Result<Option<String>> {
    Ok(get_setting::<String>(db, &api_key_setting(provider))
        .await?
        .filter(|k| !k.trim().is_empty()))
}

pub async fn set_api_key(db: &SqlitePool, provider: &str, key: &str) -> Result<()> {
    set_setting(db, &api_key_setting(provider), key).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T: ToString>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;
    Ok(())
}

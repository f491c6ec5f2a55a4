//! Configuration resolution for ore-engine
//!
//! Provider API keys resolve Database → ENV → TOML. Tuning knobs come from the
//! TOML `[tuning]` section with compiled defaults underneath.

use crate::bulk::BulkSettings;
use crate::chain::DEFAULT_MAX_DEPTH;
use crate::contacts::ContactSettings;
use crate::waterfall::{RetryPolicy, DEFAULT_POOL_LIMIT};
use ore_common::config::TomlConfig;
use ore_common::Result;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable holding a provider's API key ("ORE_OPENCORPORATES_API_KEY")
pub fn api_key_env_var(provider: &str) -> String {
    format!("ORE_{}_API_KEY", provider.to_uppercase().replace(['-', ' '], "_"))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve a provider API key from the three configuration tiers
///
/// **Priority:** Database → ENV → TOML. A missing key is not an error; the
/// provider is simply left unconfigured.
pub async fn resolve_api_key(
    db: &SqlitePool,
    toml_config: &TomlConfig,
    provider: &str,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_api_key(db, provider)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(api_key_env_var(provider))
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .api_keys
        .get(provider)
        .cloned()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        ("database", db_key.is_some()),
        ("environment", env_key.is_some()),
        ("TOML", toml_key.is_some()),
    ]
    .iter()
    .filter(|(_, present)| *present)
    .map(|(name, _)| *name)
    .collect();

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            provider,
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_key.or(env_key).or(toml_key);
    match sources.first() {
        Some(source) => info!(provider, source, "API key loaded"),
        None => info!(provider, "No API key configured"),
    }
    Ok(resolved.map(|k| k.trim().to_string()))
}

/// Engine tunables with defaults applied
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_pool_limit: usize,
    pub pool_limits: BTreeMap<String, usize>,
    pub retry: RetryPolicy,
    pub chain_max_depth: usize,
    pub bulk: BulkSettings,
    pub contacts: ContactSettings,
    pub memory_cache_max_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_pool_limit: DEFAULT_POOL_LIMIT,
            pool_limits: BTreeMap::new(),
            retry: RetryPolicy::default(),
            chain_max_depth: DEFAULT_MAX_DEPTH,
            bulk: BulkSettings::default(),
            contacts: ContactSettings::default(),
            memory_cache_max_entries: crate::cache::DEFAULT_MEMORY_MAX_ENTRIES,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let tuning = &toml_config.tuning;
        let defaults = Self::default();
        let retry_defaults = defaults.retry.clone();
        let bulk_defaults = defaults.bulk.clone();

        Self {
            default_pool_limit: tuning
                .default_pool_limit
                .unwrap_or(defaults.default_pool_limit)
                .max(1),
            pool_limits: tuning.pool_limits.clone(),
            retry: RetryPolicy {
                max_attempts: tuning.retry_max_attempts.unwrap_or(retry_defaults.max_attempts).max(1),
                initial_backoff: tuning
                    .retry_initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(retry_defaults.initial_backoff),
                max_backoff: tuning
                    .retry_max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(retry_defaults.max_backoff),
            },
            chain_max_depth: tuning.chain_max_depth.unwrap_or(defaults.chain_max_depth).max(1),
            bulk: BulkSettings {
                workers: tuning.bulk_workers.unwrap_or(bulk_defaults.workers).max(1),
                flush_interval: tuning
                    .bulk_flush_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(bulk_defaults.flush_interval),
                reveal_workers: tuning.reveal_workers.unwrap_or(bulk_defaults.reveal_workers).max(1),
                research_workers: tuning
                    .research_workers
                    .unwrap_or(bulk_defaults.research_workers)
                    .max(1),
                research_top_n: tuning.research_top_n.unwrap_or(bulk_defaults.research_top_n),
            },
            contacts: ContactSettings {
                confidence_floors: tuning.confidence_floors.clone(),
                costs: tuning.provider_costs.clone(),
            },
            memory_cache_max_entries: tuning
                .memory_cache_max_entries
                .unwrap_or(defaults.memory_cache_max_entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_pool;

    #[test]
    fn test_env_var_name() {
        assert_eq!(api_key_env_var("opencorporates"), "ORE_OPENCORPORATES_API_KEY");
        assert_eq!(api_key_env_var("people-data"), "ORE_PEOPLE_DATA_API_KEY");
    }

    #[test]
    fn test_tuning_overrides_defaults() {
        let mut toml_config = TomlConfig::default();
        toml_config.tuning.bulk_workers = Some(3);
        toml_config.tuning.retry_max_attempts = Some(0);
        toml_config.tuning.confidence_floors.insert("skip_trace".to_string(), 80);

        let config = EngineConfig::from_toml(&toml_config);
        assert_eq!(config.bulk.workers, 3);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.chain_max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.contacts.floor_for("skip_trace"), 80);
        assert_eq!(config.default_pool_limit, DEFAULT_POOL_LIMIT);
    }

    #[tokio::test]
    async fn test_database_key_wins_over_toml() {
        let (_dir, pool) = temp_pool().await;
        let mut toml_config = TomlConfig::default();
        toml_config
            .api_keys
            .insert("test_registry_x".to_string(), "from-toml".to_string());

        let key = resolve_api_key(&pool, &toml_config, "test_registry_x").await.unwrap();
        assert_eq!(key.as_deref(), Some("from-toml"));

        crate::db::settings::set_api_key(&pool, "test_registry_x", "from-db").await.unwrap();
        let key = resolve_api_key(&pool, &toml_config, "test_registry_x").await.unwrap();
        assert_eq!(key.as_deref(), Some("from-db"));
    }

    #[tokio::test]
    async fn test_blank_keys_are_ignored() {
        let (_dir, pool) = temp_pool().await;
        let mut toml_config = TomlConfig::default();
        toml_config
            .api_keys
            .insert("test_registry_y".to_string(), "   ".to_string());
        assert_eq!(resolve_api_key(&pool, &toml_config, "test_registry_y").await.unwrap(), None);
    }
}

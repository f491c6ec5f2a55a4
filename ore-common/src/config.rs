//! Configuration loading and root folder resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "ORE_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "ore.db";

/// TOML configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data root folder (database lives here)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address, e.g. "127.0.0.1:5740"
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Provider API keys keyed by provider name ("opencorporates", ...)
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,

    /// Engine tuning knobs
    #[serde(default)]
    pub tuning: TuningConfig,
}

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Engine tuning section of the TOML config
///
/// Every field is optional; the engine falls back to its compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Concurrency bound per named provider pool
    #[serde(default)]
    pub pool_limits: BTreeMap<String, usize>,
    /// Default bound for pools without an explicit limit
    pub default_pool_limit: Option<usize>,
    /// Maximum attempts per provider call (rate-limit retries included)
    pub retry_max_attempts: Option<u32>,
    /// Initial backoff in milliseconds
    pub retry_initial_backoff_ms: Option<u64>,
    /// Backoff ceiling in milliseconds
    pub retry_max_backoff_ms: Option<u64>,
    /// Maximum ownership chain depth
    pub chain_max_depth: Option<usize>,
    /// Bulk job worker count
    pub bulk_workers: Option<usize>,
    /// Job counter flush interval in milliseconds
    pub bulk_flush_interval_ms: Option<u64>,
    /// Reveal pass concurrency
    pub reveal_workers: Option<usize>,
    /// Deep research pass concurrency
    pub research_workers: Option<usize>,
    /// Number of top-scored results sent to deep research
    pub research_top_n: Option<usize>,
    /// Entry bound of the in-process cache
    pub memory_cache_max_entries: Option<usize>,
    /// Client-side request rate for the corporate registry
    pub registry_requests_per_second: Option<u32>,
    /// Estimated dollars per successful call, keyed by provider name
    #[serde(default)]
    pub provider_costs: BTreeMap<String, f64>,
    /// Minimum contact confidence per provider name (0-100)
    #[serde(default)]
    pub confidence_floors: BTreeMap<String, u8>,
}

/// Resolve the root folder following the standard priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: Option<&TomlConfig>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = toml.and_then(|c| c.root_folder.clone()) {
        return root;
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Default configuration file path for a module (`~/.config/ore/<module>.toml`)
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ore").join(format!("{}.toml", module_name)))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ore"))
        .unwrap_or_else(|| PathBuf::from("./ore_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Load TOML configuration
///
/// A missing file yields the default configuration; a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No TOML config file, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write TOML configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Standard User-Agent for outbound HTTP clients
pub fn get_user_agent() -> String {
    format!("ORE/{} (owner-resolution-engine)", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_arg_wins() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), Some(&toml));
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_missing_toml_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_write_then_load_keeps_keys_and_tuning() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("ore-engine.toml");

        let mut config = TomlConfig::default();
        config
            .api_keys
            .insert("opencorporates".to_string(), "oc-key".to_string());
        config.tuning.bulk_workers = Some(3);
        config.tuning.pool_limits.insert("people_search".to_string(), 2);

        write_toml_config(&config, &path).unwrap();
        let loaded = load_toml_config(&path).unwrap();

        assert_eq!(loaded.api_keys.get("opencorporates").map(String::as_str), Some("oc-key"));
        assert_eq!(loaded.tuning.bulk_workers, Some(3));
        assert_eq!(loaded.tuning.pool_limits.get("people_search"), Some(&2));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "root_folder = [").unwrap();
        assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_user_agent_names_product() {
        assert!(get_user_agent().starts_with("ORE/"));
    }
}

//! Category-scoped TTL cache
//!
//! Every paid lookup result is cached under a category with a fixed freshness
//! window. An entry whose age reaches the window is a miss; there is no
//! background refresh, the next read after expiry goes back to the providers.
//!
//! | Category           | TTL   | Store     |
//! |--------------------|-------|-----------|
//! | `llc`              | 72h   | durable   |
//! | `owner_enrichment` | 24h   | durable   |
//! | `property`         | 168h  | durable   |
//! | `dossier`          | 24h   | durable   |
//! | `ownership_chain`  | 24h   | durable   |
//! | `search`           | 4h    | in-memory |

pub mod store;

pub use store::{CacheStore, MemoryStore, StoredEntry};

use crate::classifier::{normalize_name, strip_entity_suffix};
use chrono::{DateTime, Duration, Utc};
use ore_common::time::{age_hours, Clock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default entry bound of the in-memory store
pub const DEFAULT_MEMORY_MAX_ENTRIES: usize = 10_000;

/// Cache category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    Llc,
    OwnerEnrichment,
    Property,
    Dossier,
    OwnershipChain,
    Search,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 6] = [
        CacheCategory::Llc,
        CacheCategory::OwnerEnrichment,
        CacheCategory::Property,
        CacheCategory::Dossier,
        CacheCategory::OwnershipChain,
        CacheCategory::Search,
    ];

    /// Freshness window in hours
    pub fn ttl_hours(&self) -> i64 {
        match self {
            CacheCategory::Llc => 72,
            CacheCategory::OwnerEnrichment => 24,
            CacheCategory::Property => 168,
            CacheCategory::Dossier => 24,
            CacheCategory::OwnershipChain => 24,
            CacheCategory::Search => 4,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::hours(self.ttl_hours())
    }

    /// Storage label (`cache_entries.category`)
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Llc => "llc",
            CacheCategory::OwnerEnrichment => "owner_enrichment",
            CacheCategory::Property => "property",
            CacheCategory::Dossier => "dossier",
            CacheCategory::OwnershipChain => "ownership_chain",
            CacheCategory::Search => "search",
        }
    }

    /// Whether the category lives in the durable store
    pub fn is_durable(&self) -> bool {
        !matches!(self, CacheCategory::Search)
    }

    /// Whether lookups fall back to the suffix-stripped entity name
    pub fn uses_suffix_fallback(&self) -> bool {
        matches!(self, CacheCategory::Llc | CacheCategory::OwnershipChain)
    }

    /// Hit iff `now - cached_at < ttl`
    pub fn is_fresh(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - cached_at < self.ttl()
    }

    fn index(&self) -> usize {
        match self {
            CacheCategory::Llc => 0,
            CacheCategory::OwnerEnrichment => 1,
            CacheCategory::Property => 2,
            CacheCategory::Dossier => 3,
            CacheCategory::OwnershipChain => 4,
            CacheCategory::Search => 5,
        }
    }
}

/// Normalized cache key with an optional scope
///
/// Rendered as `NAME` or `NAME|SCOPE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    scope: Option<String>,
}

impl CacheKey {
    pub fn new(name: &str, scope: Option<&str>) -> Self {
        Self {
            name: normalize_key_part(name),
            scope: scope
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        }
    }

    /// Key without scope
    pub fn plain(name: &str) -> Self {
        Self::new(name, None)
    }

    /// Same scope, entity suffixes stripped from the name
    pub fn stripped(&self) -> Self {
        Self {
            name: strip_entity_suffix(&self.name),
            scope: self.scope.clone(),
        }
    }

    pub fn render(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}|{}", self.name, scope),
            None => self.name.clone(),
        }
    }
}

fn normalize_key_part(raw: &str) -> String {
    normalize_name(raw).replace(',', "")
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// A cache hit
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub cached_at: DateTime<Utc>,
    pub age_hours: f64,
}

/// Hit/miss counters for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: CacheCategory,
    pub ttl_hours: i64,
    pub hits: u64,
    pub misses: u64,
}

/// Snapshot of all cache counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub categories: Vec<CategoryStats>,
}

impl CacheStats {
    pub fn for_category(&self, category: CacheCategory) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.category == category)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// TTL cache over a durable store and an in-memory store
///
/// Store failures are logged and treated as misses (reads) or dropped (writes);
/// a broken cache never fails the lookup it fronts.
pub struct TtlCache {
    durable: Arc<dyn CacheStore>,
    memory: Arc<MemoryStore>,
    counters: [Counters; 6],
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(durable: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, memory_max_entries: usize) -> Self {
        Self {
            durable,
            memory: Arc::new(MemoryStore::new(memory_max_entries, clock.clone())),
            counters: Default::default(),
            clock,
        }
    }

    /// Cache with both stores in memory
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let durable = Arc::new(MemoryStore::new(usize::MAX, clock.clone()));
        Self::new(durable, clock, DEFAULT_MEMORY_MAX_ENTRIES)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn store_for(&self, category: CacheCategory) -> &dyn CacheStore {
        if category.is_durable() {
            self.durable.as_ref()
        } else {
            self.memory.as_ref()
        }
    }

    /// Candidate rendered keys in lookup order
    fn lookup_keys(category: CacheCategory, key: &CacheKey) -> Vec<String> {
        let exact = key.render();
        let mut keys = vec![exact.clone()];
        if category.uses_suffix_fallback() {
            let stripped = key.stripped().render();
            if stripped != exact {
                keys.push(stripped);
            }
        }
        keys
    }

    /// Fresh entry for `key`, if any
    pub async fn get<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        key: &CacheKey,
    ) -> Option<Cached<T>> {
        let now = self.clock.now();
        let store = self.store_for(category);

        for rendered in Self::lookup_keys(category, key) {
            let entry = match store.load(category, &rendered).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(category = category.as_str(), key = %rendered, error = %e, "Cache read failed");
                    continue;
                }
            };

            if !category.is_fresh(entry.cached_at, now) {
                debug!(category = category.as_str(), key = %rendered, "Cache entry stale");
                continue;
            }

            match serde_json::from_value::<T>(entry.payload) {
                Ok(value) => {
                    self.counters[category.index()].hits.fetch_add(1, Ordering::Relaxed);
                    debug!(category = category.as_str(), key = %rendered, "Cache hit");
                    return Some(Cached {
                        value,
                        cached_at: entry.cached_at,
                        age_hours: age_hours(entry.cached_at, now),
                    });
                }
                Err(e) => {
                    warn!(category = category.as_str(), key = %rendered, error = %e, "Cache payload did not decode");
                }
            }
        }

        self.counters[category.index()].misses.fetch_add(1, Ordering::Relaxed);
        debug!(category = category.as_str(), key = %key, "Cache miss");
        None
    }

    /// Store `value` under `key` (and its suffix-stripped alias where applicable)
    pub async fn put<T: Serialize>(&self, category: CacheCategory, key: &CacheKey, value: &T) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(category = category.as_str(), key = %key, error = %e, "Cache payload did not encode");
                return;
            }
        };
        let entry = StoredEntry {
            payload,
            cached_at: self.clock.now(),
        };

        let store = self.store_for(category);
        for rendered in Self::lookup_keys(category, key) {
            if let Err(e) = store.store(category, &rendered, entry.clone()).await {
                warn!(category = category.as_str(), key = %rendered, error = %e, "Cache write failed");
            }
        }
    }

    /// Drop `key` and its alias
    pub async fn invalidate(&self, category: CacheCategory, key: &CacheKey) {
        let store = self.store_for(category);
        for rendered in Self::lookup_keys(category, key) {
            if let Err(e) = store.remove(category, &rendered).await {
                warn!(category = category.as_str(), key = %rendered, error = %e, "Cache invalidate failed");
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            categories: CacheCategory::ALL
                .iter()
                .map(|c| {
                    let counters = &self.counters[c.index()];
                    CategoryStats {
                        category: *c,
                        ttl_hours: c.ttl_hours(),
                        hits: counters.hits.load(Ordering::Relaxed),
                        misses: counters.misses.load(Ordering::Relaxed),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ore_common::time::ManualClock;

    fn cache_at(start: DateTime<Utc>) -> (TtlCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (TtlCache::in_memory(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_llc_ttl_boundary() {
        let start = Utc::now();
        let (cache, clock) = cache_at(start);
        let key = CacheKey::new("Acme Holdings LLC", Some("us_de"));

        cache.put(CacheCategory::Llc, &key, &"record".to_string()).await;

        clock.set(start + Duration::hours(71) + Duration::minutes(59));
        let hit: Option<Cached<String>> = cache.get(CacheCategory::Llc, &key).await;
        assert_eq!(hit.map(|c| c.value).as_deref(), Some("record"));

        clock.set(start + Duration::hours(72) + Duration::minutes(1));
        let miss: Option<Cached<String>> = cache.get(CacheCategory::Llc, &key).await;
        assert!(miss.is_none());

        let stats = cache.stats();
        let llc = stats.for_category(CacheCategory::Llc).unwrap();
        assert_eq!((llc.hits, llc.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_exact_ttl_is_miss() {
        let start = Utc::now();
        let (cache, clock) = cache_at(start);
        let key = CacheKey::plain("123 MAIN ST");
        cache.put(CacheCategory::Search, &key, &1u32).await;
        clock.set(start + Duration::hours(4));
        assert!(cache.get::<u32>(CacheCategory::Search, &key).await.is_none());
    }

    #[tokio::test]
    async fn test_suffix_alias_collides() {
        let (cache, _clock) = cache_at(Utc::now());
        cache
            .put(CacheCategory::Llc, &CacheKey::new("Acme Holdings, L.L.C.", Some("US_DE")), &7u32)
            .await;

        let hit = cache
            .get::<u32>(CacheCategory::Llc, &CacheKey::new("ACME HOLDINGS", Some("us_de")))
            .await;
        assert_eq!(hit.map(|c| c.value), Some(7));

        // Scope is part of the key
        let other = cache
            .get::<u32>(CacheCategory::Llc, &CacheKey::new("ACME HOLDINGS", Some("us_fl")))
            .await;
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_no_suffix_fallback_outside_entity_categories() {
        let (cache, _clock) = cache_at(Utc::now());
        cache
            .put(CacheCategory::Property, &CacheKey::plain("ACME HOLDINGS LLC"), &1u32)
            .await;
        let hit = cache
            .get::<u32>(CacheCategory::Property, &CacheKey::plain("ACME HOLDINGS"))
            .await;
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_removes_alias() {
        let (cache, _clock) = cache_at(Utc::now());
        let key = CacheKey::plain("Oak Street LLC");
        cache.put(CacheCategory::OwnershipChain, &key, &1u32).await;
        cache.invalidate(CacheCategory::OwnershipChain, &key).await;
        assert!(cache
            .get::<u32>(CacheCategory::OwnershipChain, &CacheKey::plain("OAK STREET"))
            .await
            .is_none());
    }

    #[test]
    fn test_key_render() {
        assert_eq!(CacheKey::new("  l l c  ventures ", Some(" us_tx ")).render(), "LLC VENTURES|US_TX");
        assert_eq!(CacheKey::new("x", Some("")).render(), "X");
    }
}

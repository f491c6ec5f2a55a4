//! Cache backing stores
//!
//! A store only persists entries; freshness is decided by [`super::TtlCache`].

use super::CacheCategory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ore_common::time::Clock;
use ore_common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stored cache payload
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub payload: serde_json::Value,
    pub cached_at: DateTime<Utc>,
}

/// Persistence seam for cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, category: CacheCategory, key: &str) -> Result<Option<StoredEntry>>;

    async fn store(&self, category: CacheCategory, key: &str, entry: StoredEntry) -> Result<()>;

    async fn remove(&self, category: CacheCategory, key: &str) -> Result<()>;
}

/// In-process, size-bounded store
///
/// When the entry count exceeds `max_entries`, expired entries are pruned. Fresh
/// entries are never evicted, so the bound is soft.
pub struct MemoryStore {
    entries: RwLock<HashMap<(CacheCategory, String), StoredEntry>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            clock,
        }
    }

    /// Number of entries currently held (fresh or not)
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, category: CacheCategory, key: &str) -> Result<Option<StoredEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(category, key.to_string())).cloned())
    }

    async fn store(&self, category: CacheCategory, key: &str, entry: StoredEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert((category, key.to_string()), entry);

        if entries.len() > self.max_entries {
            let now = self.clock.now();
            let before = entries.len();
            entries.retain(|(cat, _), e| cat.is_fresh(e.cached_at, now));
            tracing::debug!(
                pruned = before - entries.len(),
                remaining = entries.len(),
                "Pruned expired in-memory cache entries"
            );
        }
        Ok(())
    }

    async fn remove(&self, category: CacheCategory, key: &str) -> Result<()> {
        self.entries.write().await.remove(&(category, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ore_common::time::ManualClock;

    #[tokio::test]
    async fn test_prune_keeps_fresh_entries() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = MemoryStore::new(2, clock.clone());

        let entry = |at| StoredEntry {
            payload: serde_json::json!({"v": 1}),
            cached_at: at,
        };

        store.store(CacheCategory::Search, "OLD", entry(start)).await.unwrap();
        clock.advance(Duration::hours(5));
        store.store(CacheCategory::Search, "A", entry(clock.now())).await.unwrap();
        store.store(CacheCategory::Search, "B", entry(clock.now())).await.unwrap();

        // OLD expired (4h TTL) and was pruned, A and B stay
        assert_eq!(store.len().await, 2);
        assert!(store.load(CacheCategory::Search, "OLD").await.unwrap().is_none());

        // Over the bound with nothing expired: nothing is evicted
        store.store(CacheCategory::Search, "C", entry(clock.now())).await.unwrap();
        assert_eq!(store.len().await, 3);
    }
}

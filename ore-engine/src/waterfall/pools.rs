//! Named bounded concurrency pools
//!
//! One semaphore per pool name, created on first use. Providers that share a
//! vendor account share a pool name so their combined in-flight calls stay
//! under the vendor's concurrency allowance.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Default bound for pools without an explicit limit
pub const DEFAULT_POOL_LIMIT: usize = 4;

pub struct ProviderPools {
    default_limit: usize,
    limits: BTreeMap<String, usize>,
    pools: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Default for ProviderPools {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_LIMIT, BTreeMap::new())
    }
}

impl ProviderPools {
    /// Limits of zero are raised to one
    pub fn new(default_limit: usize, limits: BTreeMap<String, usize>) -> Self {
        Self {
            default_limit: default_limit.max(1),
            limits,
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit_for(&self, pool: &str) -> usize {
        self.limits.get(pool).copied().unwrap_or(self.default_limit).max(1)
    }

    fn semaphore(&self, pool: &str) -> Arc<Semaphore> {
        let mut pools = self.pools.lock().unwrap_or_else(|p| p.into_inner());
        pools
            .entry(pool.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.limit_for(pool))))
            .clone()
    }

    /// Wait for a slot in `pool`
    pub async fn acquire(&self, pool: &str) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.semaphore(pool).acquire_owned().await
    }

    /// Free slots right now (for diagnostics)
    pub fn available(&self, pool: &str) -> usize {
        self.semaphore(pool).available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_bounds() {
        let mut limits = BTreeMap::new();
        limits.insert("skip_trace".to_string(), 2);
        let pools = ProviderPools::new(4, limits);

        assert_eq!(pools.limit_for("skip_trace"), 2);
        assert_eq!(pools.limit_for("anything_else"), 4);

        let a = pools.acquire("skip_trace").await.unwrap();
        let _b = pools.acquire("skip_trace").await.unwrap();
        assert_eq!(pools.available("skip_trace"), 0);
        drop(a);
        assert_eq!(pools.available("skip_trace"), 1);
    }

    #[test]
    fn test_zero_limit_raised() {
        let mut limits = BTreeMap::new();
        limits.insert("x".to_string(), 0);
        let pools = ProviderPools::new(0, limits);
        assert_eq!(pools.limit_for("x"), 1);
        assert_eq!(pools.limit_for("y"), 1);
    }
}

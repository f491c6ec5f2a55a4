//! Engine facade
//!
//! Wires the cache, waterfall executor, resolvers and pipelines together over
//! one database and one provider set, and exposes the operations the HTTP API
//! serves.

use crate::bulk::BulkPipeline;
use crate::cache::{CacheCategory, CacheStats, Cached, TtlCache};
use crate::chain::{ChainResolver, ChainResult};
use crate::config::EngineConfig;
use crate::contacts::{ContactQuery, ContactTier, ContactWaterfall, ContactWaterfallResult};
use crate::db;
use crate::db::SqliteCacheStore;
use crate::diagnostics::LastError;
use crate::enrichment::{EnrichmentReport, PhasedPipeline};
use crate::llc::{LlcResolution, LlcResolver};
use crate::models::{BulkJob, BulkJobConfig, BulkResult, Owner};
use crate::providers::{ProviderResult, ProviderSet};
use crate::waterfall::{ProviderPools, WaterfallExecutor};
use ore_common::events::EventBus;
use ore_common::time::{Clock, SystemClock};
use ore_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Fields accepted when registering an owner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOwner {
    pub name: String,
    #[serde(default)]
    pub primary_address: Option<String>,
    #[serde(default)]
    pub mailing_address: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub company_domain: Option<String>,
    #[serde(default)]
    pub aka_names: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

pub struct Engine {
    db: SqlitePool,
    cache_store: Arc<SqliteCacheStore>,
    cache: Arc<TtlCache>,
    llc: Arc<LlcResolver>,
    chains: Arc<ChainResolver>,
    contacts: Arc<ContactWaterfall>,
    phased: PhasedPipeline,
    bulk: BulkPipeline,
    last_error: LastError,
}

impl Engine {
    pub fn new(db: SqlitePool, providers: ProviderSet, config: &EngineConfig, event_bus: EventBus) -> Self {
        Self::with_clock(db, providers, config, event_bus, Arc::new(SystemClock))
    }

    /// Engine with an injected clock (cache freshness follows it)
    pub fn with_clock(
        db: SqlitePool,
        providers: ProviderSet,
        config: &EngineConfig,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache_store = Arc::new(SqliteCacheStore::new(db.clone()));
        let cache = Arc::new(TtlCache::new(
            cache_store.clone(),
            clock,
            config.memory_cache_max_entries,
        ));
        let pools = Arc::new(ProviderPools::new(
            config.default_pool_limit,
            config.pool_limits.clone(),
        ));
        let executor = Arc::new(WaterfallExecutor::new(pools, config.retry.clone()));
        let last_error = LastError::default();

        let llc = Arc::new(LlcResolver::new(
            cache.clone(),
            executor.clone(),
            providers.ai_research.clone(),
            providers.corporate_registry.clone(),
        ));
        let chains = Arc::new(ChainResolver::new(
            llc.clone(),
            cache.clone(),
            event_bus.clone(),
            config.chain_max_depth,
        ));
        let contacts = Arc::new(ContactWaterfall::new(
            executor.clone(),
            cache.clone(),
            providers.people_search.clone(),
            config.contacts.clone(),
        ));
        let phased = PhasedPipeline::new(
            db.clone(),
            providers.clone(),
            cache.clone(),
            executor.clone(),
            chains.clone(),
            contacts.clone(),
            event_bus.clone(),
            last_error.clone(),
        );
        let bulk = BulkPipeline::new(
            db.clone(),
            providers,
            executor,
            event_bus,
            config.bulk.clone(),
            last_error.clone(),
        );

        Self {
            db,
            cache_store,
            cache,
            llc,
            chains,
            contacts,
            phased,
            bulk,
            last_error,
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Most recent pipeline failure
    pub fn last_error(&self) -> &LastError {
        &self.last_error
    }

    pub async fn resolve_llc(
        &self,
        name: &str,
        jurisdiction: Option<&str>,
        force_refresh: bool,
    ) -> ProviderResult<LlcResolution> {
        self.llc.resolve(name, jurisdiction, force_refresh).await
    }

    pub async fn resolve_ownership_chain(
        &self,
        name: &str,
        jurisdiction: Option<&str>,
        force_refresh: bool,
    ) -> ChainResult {
        self.chains.resolve(name, jurisdiction, force_refresh).await
    }

    pub async fn run_contact_waterfall(&self, query: &ContactQuery, tier: ContactTier) -> ContactWaterfallResult {
        self.contacts.run(query, tier).await
    }

    /// Register an owner typed by the name classifier
    pub async fn create_owner(&self, new_owner: NewOwner) -> Result<Owner> {
        let name = new_owner.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("owner name is required".to_string()));
        }

        let mut owner = Owner::new(name, new_owner.source.as_deref().or(Some("api")));
        owner.primary_address = new_owner.primary_address.filter(|a| !a.trim().is_empty());
        owner.mailing_address = new_owner.mailing_address.filter(|a| !a.trim().is_empty());
        owner.jurisdiction = new_owner.jurisdiction.map(|j| j.trim().to_lowercase());
        owner.company_domain = new_owner.company_domain.map(|d| d.trim().to_lowercase());
        for aka in &new_owner.aka_names {
            owner.add_aka(aka);
        }
        owner.owner_type = db::owners::save_owner(&self.db, &owner).await?;

        info!(owner_id = %owner.id, owner_type = owner.owner_type.as_str(), "Owner created");
        Ok(owner)
    }

    pub async fn get_owner(&self, owner_id: Uuid) -> Result<Option<Owner>> {
        db::owners::load_owner(&self.db, owner_id).await
    }

    pub async fn run_phased_enrichment(&self, owner_id: Uuid, tier: ContactTier) -> Result<EnrichmentReport> {
        self.phased.run(owner_id, tier).await
    }

    pub async fn get_dossier(&self, owner_id: Uuid) -> Option<Cached<EnrichmentReport>> {
        self.phased.get_dossier(owner_id).await
    }

    pub async fn create_bulk_enrichment_job(&self, config: BulkJobConfig) -> Result<BulkJob> {
        self.bulk.create_job(config).await
    }

    pub async fn get_job_status(&self, job_id: Uuid) -> Result<Option<BulkJob>> {
        self.bulk.get_job_status(job_id).await
    }

    pub async fn list_job_results(&self, job_id: Uuid) -> Result<Vec<BulkResult>> {
        self.bulk.list_job_results(job_id).await
    }

    pub async fn reprocess_job(&self, job_id: Uuid) -> Result<BulkJob> {
        self.bulk.reprocess_job(job_id).await
    }

    pub async fn resume_incomplete_jobs(&self) -> Result<usize> {
        self.bulk.resume_incomplete_jobs().await
    }

    /// Wait for running bulk drivers to finish
    pub async fn wait_for_jobs(&self) {
        self.bulk.wait_idle().await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Delete durable cache entries past their category's freshness window
    ///
    /// Stale entries are never served, so this only reclaims space.
    pub async fn purge_stale_cache(&self) -> Result<u64> {
        let now = self.cache.clock().now();
        let mut purged = 0;
        for category in CacheCategory::ALL.into_iter().filter(CacheCategory::is_durable) {
            purged += self
                .cache_store
                .purge_older_than(category, now - category.ttl())
                .await?;
        }
        if purged > 0 {
            info!(purged, "Purged stale cache entries");
        }
        Ok(purged)
    }
}

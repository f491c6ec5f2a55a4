//! LLC resolver
//!
//! Looks up one entity's record: the `llc` cache first, then a waterfall of
//! AI ownership research followed by the corporate registry. Registry search
//! pages (company and officer searches) are cached separately in the
//! short-lived `search` category.

use crate::cache::{CacheCategory, CacheKey, TtlCache};
use crate::chain::PositionLookup;
use crate::classifier::{is_valid_officer_name, normalize_name, strip_entity_suffix};
use crate::providers::{
    AiResearch, BranchParent, CompanyRecord, Confidence, CorporateRegistry, EntityResearch,
    OfficerCandidate, OfficerPosition, OwnerCandidate, ProviderError, ProviderResult,
};
use crate::waterfall::{
    Accumulator, ProviderFailure, ProviderUsage, WaterfallExecutor, WaterfallProvider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Minimum name similarity for a registry hit to count as the entity
const MIN_MATCH_SIMILARITY: f64 = 0.88;

/// Research owners below this confidence do not end the waterfall
const RESEARCH_CONFIDENCE_FLOOR: Confidence = 60;

const RESEARCH_COST: f64 = 0.05;
const REGISTRY_COST: f64 = 0.0;

/// A named principal of an entity, from either source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub role: Option<String>,
    pub confidence: Confidence,
    pub source: String,
}

/// Everything known about one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlcRecord {
    pub name: String,
    pub jurisdiction: Option<String>,
    /// Best registry match
    pub company: Option<CompanyRecord>,
    /// Owners named by research
    pub research_owners: Vec<OwnerCandidate>,
    pub research_summary: Option<String>,
    pub sources: Vec<String>,
    pub providers_used: Vec<ProviderUsage>,
    pub cost_estimate: f64,
}

impl LlcRecord {
    /// Valid principals from research and registry officers, deduplicated by
    /// normalized name (highest confidence kept)
    pub fn principals(&self) -> Vec<Principal> {
        let research = self.research_owners.iter().map(|o| Principal {
            name: o.name.clone(),
            role: o.role.clone(),
            confidence: o.confidence,
            source: o.source.clone(),
        });
        let officers = self
            .company
            .iter()
            .flat_map(|c| c.officers.iter())
            .map(|o: &OfficerCandidate| Principal {
                name: o.name.clone(),
                role: o.position.clone(),
                confidence: o.confidence,
                source: o.source.clone(),
            });

        let mut order: Vec<String> = Vec::new();
        let mut best: HashMap<String, Principal> = HashMap::new();
        for p in research.chain(officers) {
            if !is_valid_officer_name(&p.name) {
                continue;
            }
            let key = normalize_name(&p.name).replace(',', "");
            match best.get(&key) {
                Some(existing) if existing.confidence >= p.confidence => {}
                Some(_) => {
                    best.insert(key, p);
                }
                None => {
                    order.push(key.clone());
                    best.insert(key, p);
                }
            }
        }
        order.into_iter().filter_map(|k| best.remove(&k)).collect()
    }

    pub fn branch_parent(&self) -> Option<&BranchParent> {
        self.company.as_ref().and_then(|c| c.branch.as_ref())
    }

    pub fn has_data(&self) -> bool {
        self.company.is_some() || !self.research_owners.is_empty()
    }
}

/// Resolver output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlcResolution {
    pub record: LlcRecord,
    pub from_cache: bool,
    pub cache_age_hours: Option<f64>,
    /// Provider calls made for this resolution (0 on a cache hit)
    pub api_calls: u32,
    pub failures: Vec<ProviderFailure>,
}

#[derive(Debug, Clone)]
pub struct LlcQuery {
    pub name: String,
    pub jurisdiction: Option<String>,
}

/// One provider's contribution
#[derive(Debug, Clone)]
pub enum LlcContribution {
    Research(EntityResearch),
    Registry(Option<CompanyRecord>),
}

impl Accumulator<LlcContribution> for LlcRecord {
    fn merge(&mut self, provider: &str, floor: Confidence, contribution: &LlcContribution) {
        match contribution {
            LlcContribution::Research(research) => {
                self.research_owners.extend(
                    research
                        .owners
                        .iter()
                        .filter(|o| o.confidence >= floor)
                        .cloned(),
                );
                if self.research_summary.is_none() {
                    self.research_summary = research.summary.clone();
                }
            }
            LlcContribution::Registry(company) => {
                if self.company.is_none() {
                    self.company = company.clone();
                }
            }
        }
        if !self.sources.iter().any(|s| s == provider) {
            self.sources.push(provider.to_string());
        }
    }
}

/// AI research step
pub struct ResearchStep {
    client: Arc<dyn AiResearch>,
}

impl ResearchStep {
    pub fn new(client: Arc<dyn AiResearch>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WaterfallProvider<LlcQuery, LlcContribution> for ResearchStep {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn pool(&self) -> &str {
        "ai_research"
    }

    fn cost_estimate(&self) -> f64 {
        RESEARCH_COST
    }

    fn confidence_floor(&self) -> Confidence {
        RESEARCH_CONFIDENCE_FLOOR
    }

    async fn call(&self, query: &LlcQuery) -> ProviderResult<LlcContribution> {
        self.client
            .research_entity_ownership(&query.name, query.jurisdiction.as_deref())
            .await
            .map(LlcContribution::Research)
    }
}

/// Corporate registry step
///
/// Searches by name (search pages cached for 4h), picks the closest match and
/// fetches the full record when the search hit lacks officers.
pub struct RegistryStep {
    client: Arc<dyn CorporateRegistry>,
    cache: Arc<TtlCache>,
}

impl RegistryStep {
    pub fn new(client: Arc<dyn CorporateRegistry>, cache: Arc<TtlCache>) -> Self {
        Self { client, cache }
    }

    async fn search(&self, query: &LlcQuery) -> ProviderResult<Vec<CompanyRecord>> {
        let key = CacheKey::new(
            &format!("{}:{}", self.client.name(), query.name),
            query.jurisdiction.as_deref(),
        );
        if let Some(cached) = self
            .cache
            .get::<Vec<CompanyRecord>>(CacheCategory::Search, &key)
            .await
        {
            return Ok(cached.value);
        }

        let companies = self
            .client
            .search_companies(&query.name, query.jurisdiction.as_deref())
            .await?;
        self.cache.put(CacheCategory::Search, &key, &companies).await;
        Ok(companies)
    }
}

#[async_trait]
impl WaterfallProvider<LlcQuery, LlcContribution> for RegistryStep {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn cost_estimate(&self) -> f64 {
        REGISTRY_COST
    }

    async fn call(&self, query: &LlcQuery) -> ProviderResult<LlcContribution> {
        let companies = self.search(query).await?;
        let Some(best) = best_match(&query.name, query.jurisdiction.as_deref(), companies) else {
            return Ok(LlcContribution::Registry(None));
        };

        if best.officers.is_empty() && !best.company_number.is_empty() && !best.jurisdiction.is_empty() {
            if let Some(full) = self
                .client
                .get_company(&best.jurisdiction, &best.company_number)
                .await?
            {
                return Ok(LlcContribution::Registry(Some(full)));
            }
        }
        Ok(LlcContribution::Registry(Some(best)))
    }
}

/// Closest registry hit by suffix-free name similarity
///
/// A hit in the requested jurisdiction beats a closer hit elsewhere.
pub fn best_match(
    name: &str,
    jurisdiction: Option<&str>,
    companies: Vec<CompanyRecord>,
) -> Option<CompanyRecord> {
    let target = strip_entity_suffix(name);
    let wanted = jurisdiction.map(str::to_lowercase);

    companies
        .into_iter()
        .map(|c| {
            let score = strsim::jaro_winkler(&target, &strip_entity_suffix(&c.name));
            let in_jurisdiction = wanted
                .as_deref()
                .map_or(false, |j| c.jurisdiction.eq_ignore_ascii_case(j));
            (c, score, in_jurisdiction)
        })
        .filter(|(_, score, _)| *score >= MIN_MATCH_SIMILARITY)
        .max_by(|a, b| {
            a.2.cmp(&b.2)
                .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        })
        .map(|(c, _, _)| c)
}

pub struct LlcResolver {
    cache: Arc<TtlCache>,
    executor: Arc<WaterfallExecutor>,
    steps: Vec<Arc<dyn WaterfallProvider<LlcQuery, LlcContribution>>>,
    registry: Option<Arc<dyn CorporateRegistry>>,
}

impl LlcResolver {
    /// Research runs before the registry when both are configured
    pub fn new(
        cache: Arc<TtlCache>,
        executor: Arc<WaterfallExecutor>,
        ai_research: Option<Arc<dyn AiResearch>>,
        registry: Option<Arc<dyn CorporateRegistry>>,
    ) -> Self {
        let mut steps: Vec<Arc<dyn WaterfallProvider<LlcQuery, LlcContribution>>> = Vec::new();
        if let Some(client) = ai_research {
            steps.push(Arc::new(ResearchStep::new(client)));
        }
        if let Some(client) = &registry {
            steps.push(Arc::new(RegistryStep::new(client.clone(), cache.clone())));
        }
        Self {
            cache,
            executor,
            steps,
            registry,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Registry offices held under a person's name
    ///
    /// Empty without a registry. Results share the `search` cache with
    /// company searches.
    pub async fn officer_positions(
        &self,
        person: &str,
        jurisdiction: Option<&str>,
    ) -> ProviderResult<PositionLookup> {
        let Some(registry) = &self.registry else {
            return Ok(PositionLookup::default());
        };
        let key = CacheKey::new(
            &format!("{}:officers:{}", registry.name(), person),
            jurisdiction,
        );
        if let Some(cached) = self
            .cache
            .get::<Vec<OfficerPosition>>(CacheCategory::Search, &key)
            .await
        {
            return Ok(PositionLookup {
                positions: cached.value,
                api_calls: 0,
            });
        }

        let positions = self
            .executor
            .call_guarded(registry.name(), || registry.search_officers(person, jurisdiction))
            .await?;
        self.cache.put(CacheCategory::Search, &key, &positions).await;
        Ok(PositionLookup {
            positions,
            api_calls: 1,
        })
    }

    /// Resolve one entity
    ///
    /// Fails only when no provider is configured or every provider failed.
    pub async fn resolve(
        &self,
        name: &str,
        jurisdiction: Option<&str>,
        force_refresh: bool,
    ) -> ProviderResult<LlcResolution> {
        let key = CacheKey::new(name, jurisdiction);

        if !force_refresh {
            if let Some(cached) = self.cache.get::<LlcRecord>(CacheCategory::Llc, &key).await {
                debug!(name, jurisdiction = ?jurisdiction, age_hours = cached.age_hours, "LLC served from cache");
                return Ok(LlcResolution {
                    record: cached.value,
                    from_cache: true,
                    cache_age_hours: Some(cached.age_hours),
                    api_calls: 0,
                    failures: Vec::new(),
                });
            }
        }

        if self.steps.is_empty() {
            return Err(ProviderError::NotConfigured(
                "no AI research or corporate registry provider".to_string(),
            ));
        }

        let query = LlcQuery {
            name: name.trim().to_string(),
            jurisdiction: jurisdiction.map(str::to_string),
        };

        let outcome = self
            .executor
            .run::<_, _, LlcRecord, _>(&self.steps, &query, |check| {
                !check.accumulated.principals().is_empty()
            })
            .await;

        let api_calls: u32 = outcome
            .providers_used
            .iter()
            .map(|u| u.attempts)
            .chain(outcome.failures.iter().map(|f| f.attempts))
            .sum();

        if outcome.providers_used.is_empty() {
            let last = outcome
                .failures
                .last()
                .map(|f| format!("{}: {}", f.provider, f.error))
                .unwrap_or_default();
            return Err(ProviderError::Network(format!("every provider failed ({})", last)));
        }

        let mut record = outcome.result;
        record.name = query.name.clone();
        record.jurisdiction = query.jurisdiction.clone();
        record.providers_used = outcome.providers_used;
        record.cost_estimate = outcome.cost_estimate;

        self.cache.put(CacheCategory::Llc, &key, &record).await;

        info!(
            name,
            jurisdiction = ?jurisdiction,
            principals = record.principals().len(),
            cost_estimate = record.cost_estimate,
            "LLC resolved"
        );

        Ok(LlcResolution {
            record,
            from_cache: false,
            cache_age_hours: None,
            api_calls,
            failures: outcome.failures,
        })
    }
}

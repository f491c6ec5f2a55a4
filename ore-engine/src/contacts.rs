//! Contact waterfall
//!
//! Finds a phone number and an email for one person by walking people-search
//! sources cheapest first, then falling back to email pattern guesses when a
//! company domain is known. The walk stops as soon as a phone **and** an email
//! at or above the answering provider's confidence floor are in hand.
//! Unverified email guesses are reported but never qualify.

use crate::cache::{CacheCategory, CacheKey, TtlCache};
use crate::classifier::person_key;
use crate::providers::{
    email_pattern, Confidence, ContactCandidate, ContactKind, EmailPatternProvider, PeopleSearch,
    PersonRecord, ProviderResult,
};
use crate::waterfall::{
    Accumulator, ProviderFailure, ProviderUsage, SufficiencyCheck, WaterfallExecutor,
    WaterfallProvider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Floor applied to providers without a configured one
pub const DEFAULT_CONFIDENCE_FLOOR: Confidence = 70;

/// Minimum similarity between the query name and a people-search hit
const MIN_PERSON_SIMILARITY: f64 = 0.85;

/// Enrichment depth requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactTier {
    /// First people-search source plus email patterns
    Basic,
    /// First two people-search sources plus email patterns
    Standard,
    /// Every configured source
    Premium,
}

impl ContactTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactTier::Basic => "basic",
            ContactTier::Standard => "standard",
            ContactTier::Premium => "premium",
        }
    }

    fn people_sources(&self) -> usize {
        match self {
            ContactTier::Basic => 1,
            ContactTier::Standard => 2,
            ContactTier::Premium => usize::MAX,
        }
    }
}

impl Default for ContactTier {
    fn default() -> Self {
        ContactTier::Standard
    }
}

impl FromStr for ContactTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(ContactTier::Basic),
            "standard" => Ok(ContactTier::Standard),
            "premium" => Ok(ContactTier::Premium),
            other => Err(format!("Unknown contact tier: {}", other)),
        }
    }
}

/// Who to look for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactQuery {
    pub name: String,
    /// "City, ST" or a full address
    pub location: Option<String>,
    pub company: Option<String>,
    pub company_domain: Option<String>,
}

/// A contact and whether it cleared its provider's floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedContact {
    #[serde(flatten)]
    pub contact: ContactCandidate,
    pub qualified: bool,
}

/// One provider's answer
#[derive(Debug, Clone, Default)]
pub struct ContactContribution {
    pub person: Option<PersonRecord>,
    pub contacts: Vec<ContactCandidate>,
}

/// Running contact set, deduplicated by (kind, normalized value)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactFindings {
    pub contacts: Vec<QualifiedContact>,
    pub person: Option<PersonRecord>,
}

impl ContactFindings {
    pub fn has_qualified(&self, kind: ContactKind) -> bool {
        self.contacts.iter().any(|c| c.qualified && c.contact.kind == kind)
    }

    fn add(&mut self, contact: &ContactCandidate, qualified: bool) {
        let normalized = contact.normalized_value();
        if normalized.is_empty() {
            return;
        }
        match self
            .contacts
            .iter_mut()
            .find(|c| c.contact.kind == contact.kind && c.contact.normalized_value() == normalized)
        {
            Some(existing) => {
                if contact.confidence > existing.contact.confidence {
                    existing.contact = contact.clone();
                }
                existing.qualified |= qualified;
            }
            None => self.contacts.push(QualifiedContact {
                contact: contact.clone(),
                qualified,
            }),
        }
    }

    /// Highest-confidence value of a kind
    pub fn best(&self, kind: ContactKind) -> Option<&ContactCandidate> {
        self.contacts
            .iter()
            .filter(|c| c.contact.kind == kind)
            .map(|c| &c.contact)
            .max_by_key(|c| c.confidence)
    }
}

/// At or above the floor and not an unconfirmed guess
fn qualifies(contact: &ContactCandidate, floor: Confidence) -> bool {
    contact.confidence >= floor && !contact.is_unverified_guess()
}

impl Accumulator<ContactContribution> for ContactFindings {
    fn merge(&mut self, _provider: &str, floor: Confidence, contribution: &ContactContribution) {
        for contact in &contribution.contacts {
            self.add(contact, qualifies(contact, floor));
        }
        if self.person.is_none() {
            self.person = contribution.person.clone();
        }
    }
}

/// Phone and email both qualified, in the latest answer or across all answers
pub fn contact_sufficiency(check: &SufficiencyCheck<'_, ContactContribution, ContactFindings>) -> bool {
    let latest_has = |kind: ContactKind| {
        check
            .latest
            .contacts
            .iter()
            .any(|c| c.kind == kind && qualifies(c, check.confidence_floor))
    };
    let latest = latest_has(ContactKind::Phone) && latest_has(ContactKind::Email);
    let accumulated = check.accumulated.has_qualified(ContactKind::Phone)
        && check.accumulated.has_qualified(ContactKind::Email);
    latest || accumulated
}

/// Per-provider cost and floor settings
#[derive(Debug, Clone, Default)]
pub struct ContactSettings {
    pub confidence_floors: BTreeMap<String, Confidence>,
    pub costs: BTreeMap<String, f64>,
}

impl ContactSettings {
    pub fn floor_for(&self, provider: &str) -> Confidence {
        self.confidence_floors
            .get(provider)
            .copied()
            .unwrap_or(DEFAULT_CONFIDENCE_FLOOR)
    }

    pub fn cost_for(&self, provider: &str) -> f64 {
        self.costs.get(provider).copied().unwrap_or(0.0)
    }
}

/// People-search adapter
pub struct PeopleSearchStep {
    client: Arc<dyn PeopleSearch>,
    floor: Confidence,
    cost: f64,
}

impl PeopleSearchStep {
    pub fn new(client: Arc<dyn PeopleSearch>, floor: Confidence, cost: f64) -> Self {
        Self { client, floor, cost }
    }
}

/// Closest person hit to `name`, if close enough
pub fn best_person_match(name: &str, people: Vec<PersonRecord>) -> Option<PersonRecord> {
    let target = person_key(name);
    people
        .into_iter()
        .map(|p| {
            let score = strsim::jaro_winkler(&target, &person_key(&p.name));
            (p, score)
        })
        .filter(|(_, score)| *score >= MIN_PERSON_SIMILARITY)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(p, _)| p)
}

#[async_trait]
impl WaterfallProvider<ContactQuery, ContactContribution> for PeopleSearchStep {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn cost_estimate(&self) -> f64 {
        self.cost
    }

    fn confidence_floor(&self) -> Confidence {
        self.floor
    }

    async fn call(&self, query: &ContactQuery) -> ProviderResult<ContactContribution> {
        let people = self
            .client
            .search_people(&query.name, query.location.as_deref())
            .await?;

        Ok(match best_person_match(&query.name, people) {
            Some(person) => ContactContribution {
                contacts: person.contacts.clone(),
                person: Some(person),
            },
            None => ContactContribution::default(),
        })
    }
}

/// Email pattern adapter (free, last resort)
pub struct EmailPatternStep {
    generator: EmailPatternProvider,
    floor: Confidence,
}

impl EmailPatternStep {
    pub fn new(floor: Confidence) -> Self {
        Self {
            generator: EmailPatternProvider::new(),
            floor,
        }
    }
}

#[async_trait]
impl WaterfallProvider<ContactQuery, ContactContribution> for EmailPatternStep {
    fn name(&self) -> &str {
        email_pattern::PROVIDER_NAME
    }

    fn confidence_floor(&self) -> Confidence {
        self.floor
    }

    async fn call(&self, query: &ContactQuery) -> ProviderResult<ContactContribution> {
        let contacts = query
            .company_domain
            .as_deref()
            .map(|domain| self.generator.generate(&query.name, domain))
            .unwrap_or_default();
        Ok(ContactContribution {
            person: None,
            contacts,
        })
    }
}

/// Contact waterfall output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactWaterfallResult {
    pub contacts: Vec<QualifiedContact>,
    pub person_data: Option<PersonRecord>,
    pub providers_used: Vec<ProviderUsage>,
    pub failures: Vec<ProviderFailure>,
    pub cost_estimate: f64,
    pub satisfied: bool,
    pub from_cache: bool,
    /// A people-search source answered (pattern guesses alone don't count)
    #[serde(default)]
    pub lookup_succeeded: bool,
}

pub struct ContactWaterfall {
    executor: Arc<WaterfallExecutor>,
    cache: Arc<TtlCache>,
    people_search: Vec<Arc<dyn PeopleSearch>>,
    settings: ContactSettings,
}

impl ContactWaterfall {
    pub fn new(
        executor: Arc<WaterfallExecutor>,
        cache: Arc<TtlCache>,
        people_search: Vec<Arc<dyn PeopleSearch>>,
        settings: ContactSettings,
    ) -> Self {
        Self {
            executor,
            cache,
            people_search,
            settings,
        }
    }

    /// Ordered steps for a tier
    pub fn steps_for(
        &self,
        tier: ContactTier,
    ) -> Vec<Arc<dyn WaterfallProvider<ContactQuery, ContactContribution>>> {
        let mut steps: Vec<Arc<dyn WaterfallProvider<ContactQuery, ContactContribution>>> = self
            .people_search
            .iter()
            .take(tier.people_sources())
            .map(|client| {
                let name = client.name();
                Arc::new(PeopleSearchStep::new(
                    client.clone(),
                    self.settings.floor_for(name),
                    self.settings.cost_for(name),
                )) as Arc<dyn WaterfallProvider<ContactQuery, ContactContribution>>
            })
            .collect();
        steps.push(Arc::new(EmailPatternStep::new(
            self.settings.floor_for(email_pattern::PROVIDER_NAME),
        )));
        steps
    }

    /// Run the waterfall for one person (cached per name, location and tier)
    pub async fn run(&self, query: &ContactQuery, tier: ContactTier) -> ContactWaterfallResult {
        let scope = format!(
            "{}|{}|{}",
            query.location.as_deref().unwrap_or_default(),
            query.company_domain.as_deref().unwrap_or_default(),
            tier.as_str()
        );
        let key = CacheKey::new(&query.name, Some(&scope));

        if let Some(cached) = self
            .cache
            .get::<ContactWaterfallResult>(CacheCategory::OwnerEnrichment, &key)
            .await
        {
            let mut result = cached.value;
            result.from_cache = true;
            return result;
        }

        let steps = self.steps_for(tier);
        let outcome = self
            .executor
            .run::<_, _, ContactFindings, _>(&steps, query, contact_sufficiency)
            .await;

        let lookup_succeeded = outcome
            .providers_used
            .iter()
            .any(|usage| usage.provider != email_pattern::PROVIDER_NAME);
        let result = ContactWaterfallResult {
            contacts: outcome.result.contacts,
            person_data: outcome.result.person,
            providers_used: outcome.providers_used,
            failures: outcome.failures,
            cost_estimate: outcome.cost_estimate,
            satisfied: outcome.satisfied,
            from_cache: false,
            lookup_succeeded,
        };

        info!(
            name = %query.name,
            tier = tier.as_str(),
            contacts = result.contacts.len(),
            satisfied = result.satisfied,
            lookup_succeeded = result.lookup_succeeded,
            cost_estimate = result.cost_estimate,
            "Contact waterfall finished"
        );

        if result.lookup_succeeded {
            self.cache.put(CacheCategory::OwnerEnrichment, &key, &result).await;
        }
        result
    }
}

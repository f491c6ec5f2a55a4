//! Phased single-owner enrichment
//!
//! Six phases run in a fixed order against one owner:
//! address_validation → property_lookup → ownership_chain →
//! contact_waterfall → franchise_tagging → summary.
//!
//! Every phase records its own status and error. An erroring phase never stops
//! the phases after it; the overall status is `complete` with no errors,
//! `failed` when every phase errored and `partial` otherwise.

pub mod property;
pub mod scoring;

pub use property::{PropertyFindings, PropertyQuery, PropertyStep};
pub use scoring::{build_summary, seller_intent_score, DossierSummary};

use crate::address::parse_full_address;
use crate::cache::{CacheCategory, CacheKey, Cached, TtlCache};
use crate::chain::{ChainResolver, ChainResult, NodeState, UnresolvedReason};
use crate::classifier::{classify, franchise_brands, person_key, strip_entity_suffix, NameKind};
use crate::contacts::{ContactQuery, ContactTier, ContactWaterfall};
use crate::db;
use crate::diagnostics::LastError;
use crate::models::{ContactInfo, Demographics, LegalEvent, Owner, OwnerLlcLink, OwnerType, Property};
use crate::providers::{Confidence, PropertyRecord, ProviderSet};
use crate::waterfall::{WaterfallExecutor, WaterfallProvider};
use chrono::{DateTime, Utc};
use ore_common::events::{EventBus, OreEvent};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Beneficial owners of an entity that get a contact waterfall each
const MAX_CONTACT_TARGETS: usize = 3;

/// Similarity at which a registry owner name counts as this owner
const OWNER_NAME_SIMILARITY: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AddressValidation,
    PropertyLookup,
    OwnershipChain,
    ContactWaterfall,
    FranchiseTagging,
    Summary,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::AddressValidation,
        Phase::PropertyLookup,
        Phase::OwnershipChain,
        Phase::ContactWaterfall,
        Phase::FranchiseTagging,
        Phase::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::AddressValidation => "address_validation",
            Phase::PropertyLookup => "property_lookup",
            Phase::OwnershipChain => "ownership_chain",
            Phase::ContactWaterfall => "contact_waterfall",
            Phase::FranchiseTagging => "franchise_tagging",
            Phase::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Idle,
    Running,
    Done,
    Skipped,
    Error,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Idle => "idle",
            PhaseStatus::Running => "running",
            PhaseStatus::Done => "done",
            PhaseStatus::Skipped => "skipped",
            PhaseStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStep {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub detail: Option<String>,
    pub error: Option<String>,
}

impl PhaseStep {
    fn idle(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Idle,
            started_at: None,
            finished_at: None,
            detail: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Complete,
    Partial,
    Failed,
}

/// Roll phase statuses up into one
pub fn overall_status(steps: &[PhaseStep]) -> OverallStatus {
    let errored = steps.iter().filter(|s| s.status == PhaseStatus::Error).count();
    if errored == 0 {
        OverallStatus::Complete
    } else if errored == steps.len() {
        OverallStatus::Failed
    } else {
        OverallStatus::Partial
    }
}

/// Everything one enrichment run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub owner: Owner,
    pub tier: ContactTier,
    pub steps: Vec<PhaseStep>,
    pub summary: Option<DossierSummary>,
    pub overall_status: OverallStatus,
    pub chain: Option<ChainResult>,
    pub properties: Vec<Property>,
    pub legal_events: Vec<LegalEvent>,
    pub contacts: Vec<ContactInfo>,
    pub cost_estimate: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
enum PhaseError {
    #[error("{0}")]
    Storage(#[from] ore_common::Error),

    #[error("{0}")]
    Failed(String),
}

enum PhaseOutcome {
    Done(String),
    Skipped(String),
}

type PhaseResult = Result<PhaseOutcome, PhaseError>;

/// State threaded through the phases of one run
struct PhaseContext {
    owner: Owner,
    tier: ContactTier,
    /// "CITY, ST" from the standardized address
    location: Option<String>,
    state: Option<String>,
    properties: Vec<Property>,
    legal_events: Vec<LegalEvent>,
    chain: Option<ChainResult>,
    beneficial_owners: Vec<(Owner, Confidence)>,
    contacts: Vec<ContactInfo>,
    cost_estimate: f64,
    summary: Option<DossierSummary>,
}

fn same_owner(candidate: &str, owner: &str) -> bool {
    let key = |name: &str| match classify(name) {
        NameKind::Person => person_key(name),
        NameKind::Entity => strip_entity_suffix(name),
    };
    strsim::jaro_winkler(&key(candidate), &key(owner)) >= OWNER_NAME_SIMILARITY
}

fn dossier_key(owner_id: Uuid) -> CacheKey {
    CacheKey::plain(&owner_id.to_string())
}

pub struct PhasedPipeline {
    db: SqlitePool,
    providers: ProviderSet,
    cache: Arc<TtlCache>,
    executor: Arc<WaterfallExecutor>,
    chains: Arc<ChainResolver>,
    contacts: Arc<ContactWaterfall>,
    event_bus: EventBus,
    last_error: LastError,
}

impl PhasedPipeline {
    pub fn new(
        db: SqlitePool,
        providers: ProviderSet,
        cache: Arc<TtlCache>,
        executor: Arc<WaterfallExecutor>,
        chains: Arc<ChainResolver>,
        contacts: Arc<ContactWaterfall>,
        event_bus: EventBus,
        last_error: LastError,
    ) -> Self {
        Self {
            db,
            providers,
            cache,
            executor,
            chains,
            contacts,
            event_bus,
            last_error,
        }
    }

    /// Run all phases for one owner
    ///
    /// Fails only when the owner does not exist; phase failures are recorded in
    /// the report.
    pub async fn run(&self, owner_id: Uuid, tier: ContactTier) -> ore_common::Result<EnrichmentReport> {
        let owner = db::owners::load_owner(&self.db, owner_id)
            .await?
            .ok_or_else(|| ore_common::Error::NotFound(format!("owner {}", owner_id)))?;

        info!(owner_id = %owner_id, name = %owner.name, tier = tier.as_str(), "Phased enrichment started");

        let mut ctx = PhaseContext {
            owner,
            tier,
            location: None,
            state: None,
            properties: Vec::new(),
            legal_events: Vec::new(),
            chain: None,
            beneficial_owners: Vec::new(),
            contacts: Vec::new(),
            cost_estimate: 0.0,
            summary: None,
        };

        let mut steps: Vec<PhaseStep> = Phase::ALL.iter().map(|p| PhaseStep::idle(*p)).collect();

        for step in steps.iter_mut() {
            step.status = PhaseStatus::Running;
            step.started_at = Some(Utc::now());
            self.emit_phase(owner_id, step);

            let result = match step.phase {
                Phase::AddressValidation => self.validate_address(&mut ctx).await,
                Phase::PropertyLookup => self.lookup_properties(&mut ctx).await,
                Phase::OwnershipChain => self.resolve_chain(&mut ctx).await,
                Phase::ContactWaterfall => self.find_contacts(&mut ctx).await,
                Phase::FranchiseTagging => self.tag_franchises(&mut ctx).await,
                Phase::Summary => self.summarize(&mut ctx).await,
            };

            step.finished_at = Some(Utc::now());
            match result {
                Ok(PhaseOutcome::Done(detail)) => {
                    step.status = PhaseStatus::Done;
                    step.detail = Some(detail);
                }
                Ok(PhaseOutcome::Skipped(reason)) => {
                    step.status = PhaseStatus::Skipped;
                    step.detail = Some(reason);
                }
                Err(e) => {
                    warn!(owner_id = %owner_id, phase = step.phase.as_str(), error = %e, "Phase failed");
                    self.last_error
                        .record(&format!("phase:{}", step.phase.as_str()), format!("owner {}: {}", owner_id, e))
                        .await;
                    step.status = PhaseStatus::Error;
                    step.error = Some(e.to_string());
                }
            }
            self.emit_phase(owner_id, step);
        }

        let overall = overall_status(&steps);
        let report = EnrichmentReport {
            owner: ctx.owner,
            tier,
            steps,
            summary: ctx.summary,
            overall_status: overall,
            chain: ctx.chain,
            properties: ctx.properties,
            legal_events: ctx.legal_events,
            contacts: ctx.contacts,
            cost_estimate: ctx.cost_estimate,
            generated_at: Utc::now(),
        };

        self.cache
            .put(CacheCategory::Dossier, &dossier_key(owner_id), &report)
            .await;

        info!(
            owner_id = %owner_id,
            overall_status = ?overall,
            cost_estimate = report.cost_estimate,
            "Phased enrichment finished"
        );
        Ok(report)
    }

    /// Last report for an owner, if still fresh
    pub async fn get_dossier(&self, owner_id: Uuid) -> Option<Cached<EnrichmentReport>> {
        self.cache
            .get::<EnrichmentReport>(CacheCategory::Dossier, &dossier_key(owner_id))
            .await
    }

    fn emit_phase(&self, owner_id: Uuid, step: &PhaseStep) {
        self.event_bus.emit_lossy(OreEvent::PhaseChanged {
            owner_id,
            phase: step.phase.as_str().to_string(),
            status: step.status.as_str().to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn validate_address(&self, ctx: &mut PhaseContext) -> PhaseResult {
        let (raw, is_primary) = match (&ctx.owner.primary_address, &ctx.owner.mailing_address) {
            (Some(primary), _) => (primary.clone(), true),
            (None, Some(mailing)) => (mailing.clone(), false),
            (None, None) => return Ok(PhaseOutcome::Skipped("no address on file".to_string())),
        };

        let parsed = parse_full_address(&raw)
            .map_err(|e| PhaseError::Failed(format!("address did not parse: {}", e)))?;
        ctx.location = Some(format!("{}, {}", parsed.city, parsed.state));
        ctx.state = Some(parsed.state.clone());

        let (standardized, detail) = match &self.providers.address_verification {
            Some(client) => match client.verify_address(&parsed).await {
                Ok(verified) => {
                    let detail = format!(
                        "verified by {} (deliverable: {})",
                        client.name(),
                        verified.deliverable
                    );
                    (verified.one_line(), detail)
                }
                Err(e) => {
                    warn!(provider = client.name(), error = %e, "Address verification failed, using local standardization");
                    (parsed.one_line(), format!("verification failed ({}), standardized locally", e))
                }
            },
            None => (parsed.one_line(), "standardized locally".to_string()),
        };

        if is_primary {
            ctx.owner.primary_address = Some(standardized);
        } else {
            ctx.owner.mailing_address = Some(standardized);
        }
        ctx.owner.owner_type = db::owners::save_owner(&self.db, &ctx.owner).await?;
        Ok(PhaseOutcome::Done(detail))
    }

    async fn lookup_properties(&self, ctx: &mut PhaseContext) -> PhaseResult {
        let Some(client) = &self.providers.property_registry else {
            return Ok(PhaseOutcome::Skipped("no property registry configured".to_string()));
        };

        let query = PropertyQuery {
            address: ctx.owner.primary_address.clone(),
            owner_name: ctx.owner.name.clone(),
            state: ctx.state.clone(),
        };
        let steps: Vec<Arc<dyn WaterfallProvider<PropertyQuery, Vec<PropertyRecord>>>> = vec![
            Arc::new(PropertyStep::by_address(client.clone(), self.cache.clone())),
            Arc::new(PropertyStep::by_owner(client.clone(), self.cache.clone())),
        ];
        let outcome = self
            .executor
            .run::<_, _, PropertyFindings, _>(&steps, &query, |_| false)
            .await;

        if outcome.providers_used.is_empty() {
            if let Some(failure) = outcome.failures.last() {
                return Err(PhaseError::Failed(format!(
                    "property registry failed: {}",
                    failure.error
                )));
            }
        }
        ctx.cost_estimate += outcome.cost_estimate;

        let owner_id = ctx.owner.id;
        let mut linked = 0usize;
        let mut new_events = 0usize;
        for record in &outcome.result.records {
            let owned = record
                .owner_name
                .as_deref()
                .map_or(true, |name| same_owner(name, &ctx.owner.name));
            let property = Property::from_record(record, owned.then_some(owner_id));
            let property_id = db::properties::save_property(&self.db, &property).await?;
            if owned {
                linked += 1;
                if ctx.owner.mailing_address.is_none() {
                    ctx.owner.mailing_address = record.owner_mailing_address.clone();
                }
            }

            for event in &record.legal_events {
                let event = LegalEvent::from_record(event, owned.then_some(owner_id), Some(property_id));
                if db::properties::append_legal_event(&self.db, &event).await? {
                    new_events += 1;
                }
            }
        }

        ctx.owner.owner_type = db::owners::save_owner(&self.db, &ctx.owner).await?;
        ctx.properties = db::properties::load_properties_for_owner(&self.db, owner_id).await?;
        ctx.legal_events = db::properties::load_legal_events_for_owner(&self.db, owner_id).await?;

        Ok(PhaseOutcome::Done(format!(
            "{} of {} parcels linked, {} new legal events",
            linked,
            outcome.result.records.len(),
            new_events
        )))
    }

    async fn resolve_chain(&self, ctx: &mut PhaseContext) -> PhaseResult {
        if !ctx.owner.is_entity() {
            return Ok(PhaseOutcome::Skipped("individual owner".to_string()));
        }

        let chain = self
            .chains
            .resolve(&ctx.owner.name, ctx.owner.jurisdiction.as_deref(), false)
            .await;

        if let Some(root) = chain.root() {
            if root.state == NodeState::Unresolved(UnresolvedReason::ProviderFailure) {
                return Err(PhaseError::Failed(format!(
                    "entity lookup failed: {}",
                    root.error.clone().unwrap_or_default()
                )));
            }
        }

        for ubo in &chain.ultimate_beneficial_owners {
            let person = match db::owners::find_owner_by_name(&self.db, &ubo.name, OwnerType::Individual).await? {
                Some(existing) => existing,
                None => {
                    let mut person = Owner::new(&ubo.name, Some("ownership_chain"));
                    person.owner_type = db::owners::save_owner(&self.db, &person).await?;
                    person
                }
            };

            let link = OwnerLlcLink {
                individual_id: person.id,
                entity_id: ctx.owner.id,
                relationship: ubo
                    .roles
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "beneficial owner".to_string()),
                confidence: ubo.confidence,
                rationale: Some(format!("Listed by {}", ubo.via.join(", "))),
                updated_at: Utc::now(),
            };
            db::owners::save_owner_llc_link(&self.db, &link).await?;
            ctx.beneficial_owners.push((person, ubo.confidence));
        }

        let detail = format!(
            "{} beneficial owners across {} entities ({} provider calls{})",
            chain.ultimate_beneficial_owners.len(),
            chain.expanded_entities().len(),
            chain.total_api_calls,
            if chain.from_cache { ", cached" } else { "" }
        );
        ctx.chain = Some(chain);
        Ok(PhaseOutcome::Done(detail))
    }

    async fn find_contacts(&self, ctx: &mut PhaseContext) -> PhaseResult {
        let mut targets: Vec<Owner> = if ctx.owner.is_entity() {
            let mut ubos = ctx.beneficial_owners.clone();
            ubos.sort_by(|a, b| b.1.cmp(&a.1));
            ubos.into_iter().take(MAX_CONTACT_TARGETS).map(|(o, _)| o).collect()
        } else {
            vec![ctx.owner.clone()]
        };
        if targets.is_empty() {
            return Ok(PhaseOutcome::Skipped("no beneficial owners to contact".to_string()));
        }

        let company = ctx.owner.is_entity().then(|| ctx.owner.name.clone());
        let mut failed = 0usize;
        let mut saved = 0usize;

        for person in targets.iter_mut() {
            let query = ContactQuery {
                name: person.name.clone(),
                location: ctx.location.clone(),
                company: company.clone(),
                company_domain: ctx.owner.company_domain.clone(),
            };
            let result = self.contacts.run(&query, ctx.tier).await;
            if !result.from_cache {
                ctx.cost_estimate += result.cost_estimate;
            }
            if !result.lookup_succeeded && !result.failures.is_empty() {
                failed += 1;
                continue;
            }

            for qualified in &result.contacts {
                let contact = &qualified.contact;
                let info = ContactInfo::new(
                    person.id,
                    contact.kind,
                    &contact.value,
                    &contact.source,
                    contact.confidence,
                );
                db::owners::save_contact(&self.db, &info).await?;
                saved += 1;
            }

            let best = result
                .contacts
                .iter()
                .filter(|c| c.qualified)
                .map(|c| c.contact.confidence)
                .max();
            if best.is_some() {
                person.contact_confidence = best.max(person.contact_confidence);
            }
            if let Some(found) = &result.person_data {
                person.demographics = Some(Demographics {
                    age: found.age,
                    birth_date: found.birth_date.clone(),
                    relatives: found.relatives.clone(),
                    associates: found.associates.clone(),
                    previous_addresses: found.previous_addresses.clone(),
                });
                if person.primary_address.is_none() {
                    person.primary_address = found.current_address.clone();
                }
            }
            person.owner_type = db::owners::save_owner(&self.db, person).await?;
            ctx.contacts
                .extend(db::owners::load_contacts(&self.db, person.id).await?);
        }

        if failed == targets.len() {
            return Err(PhaseError::Failed(format!(
                "every contact lookup failed ({} people)",
                failed
            )));
        }

        if ctx.owner.is_entity() {
            ctx.owner.contact_confidence = targets.iter().filter_map(|t| t.contact_confidence).max();
            ctx.owner.owner_type = db::owners::save_owner(&self.db, &ctx.owner).await?;
        } else if let Some(updated) = targets.into_iter().next() {
            ctx.owner = updated;
        }

        Ok(PhaseOutcome::Done(format!(
            "{} contacts saved, {} lookups failed",
            saved, failed
        )))
    }

    async fn tag_franchises(&self, ctx: &mut PhaseContext) -> PhaseResult {
        let mut names: Vec<String> = vec![ctx.owner.name.clone()];
        names.extend(ctx.owner.aka_names.iter().cloned());
        if let Some(chain) = &ctx.chain {
            names.extend(
                chain
                    .chain
                    .iter()
                    .filter(|n| n.kind == NameKind::Entity)
                    .map(|n| n.name.clone()),
            );
        }

        let brands: BTreeSet<&'static str> = names.iter().flat_map(|n| franchise_brands(n)).collect();
        if brands.is_empty() {
            return Ok(PhaseOutcome::Done("no franchise brands".to_string()));
        }

        for brand in &brands {
            let flag = format!("franchise:{}", brand.to_lowercase().replace(' ', "_"));
            ctx.owner.add_risk_flag(&flag);
        }
        ctx.owner.owner_type = db::owners::save_owner(&self.db, &ctx.owner).await?;
        Ok(PhaseOutcome::Done(format!(
            "tagged {}",
            brands.into_iter().collect::<Vec<_>>().join(", ")
        )))
    }

    async fn summarize(&self, ctx: &mut PhaseContext) -> PhaseResult {
        let owner_id = ctx.owner.id;
        ctx.properties = db::properties::load_properties_for_owner(&self.db, owner_id).await?;
        ctx.legal_events = db::properties::load_legal_events_for_owner(&self.db, owner_id).await?;
        if !ctx.owner.is_entity() {
            ctx.contacts = db::owners::load_contacts(&self.db, owner_id).await?;
        }

        let score = seller_intent_score(&ctx.owner, &ctx.properties, &ctx.legal_events, Utc::now());
        ctx.owner.seller_intent_score = Some(score);
        ctx.owner.owner_type = db::owners::save_owner(&self.db, &ctx.owner).await?;

        let summary = build_summary(
            &ctx.owner,
            &ctx.properties,
            &ctx.legal_events,
            &ctx.contacts,
            ctx.chain.as_ref(),
            score,
        );
        let headline = summary.headline.clone();
        ctx.summary = Some(summary);
        Ok(PhaseOutcome::Done(headline))
    }
}

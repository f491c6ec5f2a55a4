//! Per-target contact strategies
//!
//! Strategies run in priority order: investor directory search, people
//! directory search by company, then skip-trace for people-named contacts the
//! directory left without a phone or email.

use crate::classifier::{is_person, person_key};
use crate::contacts::best_person_match;
use crate::models::{BulkResult, BulkTarget};
use crate::providers::{ContactKind, DirectoryContact, ProviderResult, ProviderSet};
use crate::waterfall::WaterfallExecutor;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const INVESTOR_SEARCH: &str = "investor_directory";
const COMPANY_SEARCH: &str = "company_directory";
const SKIP_TRACE: &str = "skip_trace";

/// Everything one target produced
#[derive(Debug, Default)]
pub struct TargetOutcome {
    pub results: Vec<BulkResult>,
    pub attempted: usize,
    pub failed: usize,
    pub last_error: Option<String>,
}

impl TargetOutcome {
    /// Every strategy that ran returned an error (or none could run)
    pub fn is_error(&self) -> bool {
        self.attempted == 0 || self.failed == self.attempted
    }

    fn record_failure(&mut self, strategy: &str, error: String) {
        self.failed += 1;
        self.last_error = Some(format!("{}: {}", strategy, error));
    }
}

/// Likelihood a result leads to a conversation (0-100)
///
/// Seniority of the title sets the base; a phone adds 30, an email 20 and the
/// provider confidence a tenth of itself.
pub fn result_intent_score(title: Option<&str>, has_phone: bool, has_email: bool, confidence: u8) -> u8 {
    const OWNER_TITLES: &[&str] = &[
        "OWNER", "FOUNDER", "PRINCIPAL", "MANAGING MEMBER", "PRESIDENT", "CEO", "CHIEF EXECUTIVE",
    ];
    const SENIOR_TITLES: &[&str] = &["DIRECTOR", "VP", "VICE PRESIDENT", "PARTNER", "CFO", "COO"];

    let title = title.unwrap_or_default().to_uppercase();
    let mut score: u32 = if OWNER_TITLES.iter().any(|t| title.contains(t)) {
        40
    } else if SENIOR_TITLES.iter().any(|t| title.contains(t)) {
        25
    } else if title.contains("MANAGER") {
        15
    } else {
        5
    };
    if has_phone {
        score += 30;
    }
    if has_email {
        score += 20;
    }
    score += u32::from(confidence) / 10;
    score.min(100) as u8
}

/// Directory contact → result row
fn to_result(target: &BulkTarget, contact: &DirectoryContact, providers: Vec<String>) -> BulkResult {
    let phone = contact.phone.clone().filter(|p| !p.trim().is_empty());
    let email = contact.email.clone().filter(|e| !e.trim().is_empty());
    BulkResult {
        id: Uuid::new_v4(),
        job_id: target.job_id,
        target_id: target.id,
        person_name: contact.name.trim().to_string(),
        title: contact.title.clone(),
        company: contact.company.clone().unwrap_or_else(|| target.company.clone()),
        intent_score: result_intent_score(
            contact.title.as_deref(),
            phone.is_some(),
            email.is_some(),
            contact.confidence,
        ),
        phone,
        email,
        confidence: contact.confidence,
        providers,
        handle: contact.handle.clone(),
        outreach_rationale: None,
        created_at: Utc::now(),
    }
}

/// Fold a contact into the outcome, merging rows for the same person
fn merge_contact(outcome: &mut TargetOutcome, target: &BulkTarget, contact: &DirectoryContact, provider: &str) {
    if contact.name.trim().is_empty() {
        return;
    }
    let key = person_key(&contact.name);
    match outcome
        .results
        .iter_mut()
        .find(|r| person_key(&r.person_name) == key)
    {
        Some(existing) => {
            if existing.phone.is_none() {
                existing.phone = contact.phone.clone().filter(|p| !p.trim().is_empty());
            }
            if existing.email.is_none() {
                existing.email = contact.email.clone().filter(|e| !e.trim().is_empty());
            }
            if existing.title.is_none() {
                existing.title = contact.title.clone();
            }
            if existing.handle.is_none() {
                existing.handle = contact.handle.clone();
            }
            existing.confidence = existing.confidence.max(contact.confidence);
            if !existing.providers.iter().any(|p| p == provider) {
                existing.providers.push(provider.to_string());
            }
            existing.intent_score = result_intent_score(
                existing.title.as_deref(),
                existing.phone.is_some(),
                existing.email.is_some(),
                existing.confidence,
            );
        }
        None => outcome
            .results
            .push(to_result(target, contact, vec![provider.to_string()])),
    }
}

/// Runs the strategies for one target
pub struct TargetProcessor {
    providers: ProviderSet,
    executor: Arc<WaterfallExecutor>,
}

impl TargetProcessor {
    pub fn new(providers: ProviderSet, executor: Arc<WaterfallExecutor>) -> Self {
        Self { providers, executor }
    }

    /// One provider call inside its pool, with rate-limit retries
    async fn call<T, F, Fut>(&self, provider: &str, operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        self.executor.call_guarded(provider, operation).await
    }

    pub async fn process(&self, target: &BulkTarget) -> TargetOutcome {
        let mut outcome = TargetOutcome::default();

        if let Some(directory) = &self.providers.contact_directory {
            let provider = directory.name();

            outcome.attempted += 1;
            match self
                .call(provider, || directory.search_investors(&target.company))
                .await
            {
                Ok(found) => {
                    debug!(company = %target.company, found = found.len(), strategy = INVESTOR_SEARCH, "Strategy answered");
                    for contact in &found {
                        merge_contact(&mut outcome, target, contact, provider);
                    }
                }
                Err(e) => {
                    warn!(company = %target.company, provider, error = %e, strategy = INVESTOR_SEARCH, "Strategy failed");
                    outcome.record_failure(INVESTOR_SEARCH, e.to_string());
                }
            }

            outcome.attempted += 1;
            match self
                .call(provider, || directory.search_people_by_company(&target.company))
                .await
            {
                Ok(found) => {
                    debug!(company = %target.company, found = found.len(), strategy = COMPANY_SEARCH, "Strategy answered");
                    for contact in &found {
                        merge_contact(&mut outcome, target, contact, provider);
                    }
                }
                Err(e) => {
                    warn!(company = %target.company, provider, error = %e, strategy = COMPANY_SEARCH, "Strategy failed");
                    outcome.record_failure(COMPANY_SEARCH, e.to_string());
                }
            }
        }

        self.skip_trace(target, &mut outcome).await;
        outcome
    }

    /// Skip-trace people-named rows missing a phone or email
    ///
    /// With no rows at all, a target whose company name is itself a person
    /// (sole proprietor) is traced directly.
    async fn skip_trace(&self, target: &BulkTarget, outcome: &mut TargetOutcome) {
        let Some(people) = self.providers.people_search.first() else {
            return;
        };
        let provider = people.name();

        let mut names: Vec<String> = outcome
            .results
            .iter()
            .filter(|r| (r.phone.is_none() || r.email.is_none()) && is_person(&r.person_name))
            .map(|r| r.person_name.clone())
            .collect();
        if outcome.results.is_empty() && is_person(&target.company) {
            names.push(target.company.clone());
        }

        for name in names {
            outcome.attempted += 1;
            let location = target.location.as_deref();
            let found = match self.call(provider, || people.search_people(&name, location)).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(name = %name, provider, error = %e, strategy = SKIP_TRACE, "Strategy failed");
                    outcome.record_failure(SKIP_TRACE, e.to_string());
                    continue;
                }
            };
            let Some(person) = best_person_match(&name, found) else {
                continue;
            };

            let best = |kind: ContactKind| {
                person
                    .contacts
                    .iter()
                    .filter(|c| c.kind == kind)
                    .max_by_key(|c| c.confidence)
                    .map(|c| c.value.clone())
            };
            let traced = DirectoryContact {
                name: name.clone(),
                title: None,
                company: Some(target.company.clone()),
                handle: None,
                phone: best(ContactKind::Phone),
                email: best(ContactKind::Email),
                confidence: person.confidence,
                source: provider.to_string(),
            };
            merge_contact(outcome, target, &traced, provider);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BulkTargetInput;

    fn target() -> BulkTarget {
        BulkTarget::from_input(
            Uuid::new_v4(),
            0,
            &BulkTargetInput {
                company: "Acme Holdings LLC".to_string(),
                domain: None,
                location: None,
            },
        )
    }

    #[test]
    fn test_intent_score_ordering() {
        let owner = result_intent_score(Some("Managing Member"), true, true, 90);
        let analyst = result_intent_score(Some("Analyst"), false, false, 90);
        assert_eq!(owner, 99);
        assert_eq!(analyst, 14);
        assert_eq!(result_intent_score(None, true, true, 100), 65);
    }

    #[test]
    fn test_merge_contact_combines_same_person() {
        let target = target();
        let mut outcome = TargetOutcome::default();
        let first = DirectoryContact {
            name: "John A Smith".to_string(),
            title: Some("Owner".to_string()),
            phone: Some("555-123-4567".to_string()),
            confidence: 70,
            ..Default::default()
        };
        let second = DirectoryContact {
            name: "SMITH, JOHN A".to_string(),
            email: Some("john@acme.test".to_string()),
            confidence: 85,
            ..Default::default()
        };
        merge_contact(&mut outcome, &target, &first, "dir");
        merge_contact(&mut outcome, &target, &second, "trace");

        assert_eq!(outcome.results.len(), 1);
        let row = &outcome.results[0];
        assert_eq!(row.email.as_deref(), Some("john@acme.test"));
        assert_eq!(row.confidence, 85);
        assert_eq!(row.providers, vec!["dir".to_string(), "trace".to_string()]);
        assert_eq!(row.company, "Acme Holdings LLC");
    }

    #[test]
    fn test_error_rule() {
        let mut outcome = TargetOutcome::default();
        assert!(outcome.is_error());
        outcome.attempted = 2;
        outcome.failed = 1;
        assert!(!outcome.is_error());
        outcome.failed = 2;
        assert!(outcome.is_error());
    }
}

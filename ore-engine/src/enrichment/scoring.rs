//! Seller-intent scoring and the dossier summary
//!
//! Both are pure functions of what the earlier phases stored, so the same
//! owner state always yields the same score and text.

use crate::chain::ChainResult;
use crate::models::{ContactInfo, LegalEvent, Owner, OwnerType, Property};
use crate::providers::ContactKind;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Years since last sale after which an owner counts as long-tenured
const LONG_TENURE_YEARS: i32 = 10;

/// Deterministic owner summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DossierSummary {
    pub headline: String,
    pub owner_type: OwnerType,
    pub property_count: usize,
    pub total_assessed_value: i64,
    pub legal_event_count: usize,
    pub beneficial_owners: Vec<String>,
    pub best_phone: Option<String>,
    pub best_email: Option<String>,
    pub contact_confidence: Option<u8>,
    pub seller_intent_score: u8,
    pub risk_flags: Vec<String>,
}

/// Signals that raise the likelihood an owner would sell (0-100)
///
/// - entity ownership: +15
/// - mailing address not among the owned parcels (absentee): +20
/// - each legal event: +10, at most +30
/// - a parcel last sold more than ten years ago: +15
/// - three or more parcels: +10
/// - a franchise tenant risk flag: +10
pub fn seller_intent_score(
    owner: &Owner,
    properties: &[Property],
    legal_events: &[LegalEvent],
    now: DateTime<Utc>,
) -> u8 {
    let mut score: u32 = 0;

    if owner.owner_type == OwnerType::Entity {
        score += 15;
    }

    if let Some(mailing) = owner.mailing_address.as_deref() {
        let mailing = squash(mailing);
        if !properties.is_empty() && !properties.iter().any(|p| squash(&p.address) == mailing) {
            score += 20;
        }
    }

    score += (legal_events.len() as u32 * 10).min(30);

    let long_tenure = properties.iter().any(|p| {
        p.last_sale_date
            .as_deref()
            .and_then(sale_year)
            .map_or(false, |year| now.year() - year > LONG_TENURE_YEARS)
    });
    if long_tenure {
        score += 15;
    }

    if properties.len() >= 3 {
        score += 10;
    }

    if owner.risk_flags.iter().any(|f| f.starts_with("franchise:")) {
        score += 10;
    }

    score.min(100) as u8
}

fn squash(address: &str) -> String {
    address
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Leading four-digit year of a date string ("2009-04-01", "2009")
fn sale_year(date: &str) -> Option<i32> {
    date.trim().get(..4).and_then(|y| y.parse().ok())
}

pub fn build_summary(
    owner: &Owner,
    properties: &[Property],
    legal_events: &[LegalEvent],
    contacts: &[ContactInfo],
    chain: Option<&ChainResult>,
    seller_intent_score: u8,
) -> DossierSummary {
    let best = |kind: ContactKind| {
        contacts
            .iter()
            .filter(|c| c.kind == kind)
            .max_by_key(|c| c.confidence)
            .map(|c| c.value.clone())
    };
    let beneficial_owners: Vec<String> = chain
        .map(|c| {
            c.ultimate_beneficial_owners
                .iter()
                .map(|u| u.name.clone())
                .collect()
        })
        .unwrap_or_default();

    let mut headline = format!(
        "{} ({}): {} {}",
        owner.name,
        owner.owner_type.as_str(),
        properties.len(),
        if properties.len() == 1 { "property" } else { "properties" },
    );
    if !beneficial_owners.is_empty() {
        headline.push_str(&format!(", {} beneficial owner(s)", beneficial_owners.len()));
    }
    if !legal_events.is_empty() {
        headline.push_str(&format!(", {} legal event(s)", legal_events.len()));
    }
    headline.push_str(&format!(", seller intent {}/100", seller_intent_score));

    DossierSummary {
        headline,
        owner_type: owner.owner_type,
        property_count: properties.len(),
        total_assessed_value: properties.iter().filter_map(|p| p.assessed_value).sum(),
        legal_event_count: legal_events.len(),
        beneficial_owners,
        best_phone: best(ContactKind::Phone),
        best_email: best(ContactKind::Email),
        contact_confidence: owner.contact_confidence,
        seller_intent_score,
        risk_flags: owner.risk_flags.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::PropertyRecord;
    use chrono::TimeZone;

    fn property(address: &str, last_sale: Option<&str>) -> Property {
        Property::from_record(
            &PropertyRecord {
                address: address.to_string(),
                last_sale_date: last_sale.map(str::to_string),
                assessed_value: Some(100_000),
                ..Default::default()
            },
            None,
        )
    }

    #[test]
    fn test_score_signals() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut owner = Owner::new("ACME HOLDINGS LLC", None);
        owner.mailing_address = Some("PO Box 9, Dallas TX".to_string());
        let properties = vec![
            property("1 Main St", Some("2001-05-01")),
            property("2 Main St", None),
            property("3 Main St", Some("2024-01-01")),
        ];
        // 15 entity + 20 absentee + 15 tenure + 10 portfolio
        assert_eq!(seller_intent_score(&owner, &properties, &[], now), 60);

        owner.mailing_address = Some("1 MAIN ST".to_string());
        assert_eq!(seller_intent_score(&owner, &properties, &[], now), 40);
    }

    #[test]
    fn test_score_is_capped() {
        let now = Utc::now();
        let mut owner = Owner::new("ACME HOLDINGS LLC", None);
        owner.add_risk_flag("franchise:wendys");
        owner.mailing_address = Some("elsewhere".to_string());
        let properties: Vec<Property> = (0..5).map(|i| property(&format!("{} Elm", i), Some("1990"))).collect();
        let events: Vec<LegalEvent> = (0..6)
            .map(|i| LegalEvent {
                id: uuid::Uuid::new_v4(),
                owner_id: None,
                property_id: None,
                kind: "lien".to_string(),
                external_ref: format!("L{}", i),
                filed_on: None,
                amount: None,
                description: None,
                recorded_at: now,
            })
            .collect();
        assert_eq!(seller_intent_score(&owner, &properties, &events, now), 100);
    }

    #[test]
    fn test_summary_headline() {
        let owner = Owner::new("JOHN SMITH", None);
        let summary = build_summary(&owner, &[property("1 Main St", None)], &[], &[], None, 0);
        assert_eq!(summary.headline, "JOHN SMITH (individual): 1 property, seller intent 0/100");
        assert_eq!(summary.total_assessed_value, 100_000);
    }
}

//! External data provider seams
//!
//! Every paid source is consumed through one of the traits below and produces
//! one of the normalized record types. Adapters translate vendor payloads into
//! these records; nothing downstream sees a vendor shape.

pub mod email_pattern;
pub mod opencorporates;

pub use email_pattern::EmailPatternProvider;
pub use opencorporates::OpenCorporatesClient;

use crate::address::ParsedAddress;
use crate::classifier::NameKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Provider call failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Vendor throttled the call; the only retryable failure
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Confidence on a 0-100 scale
pub type Confidence = u8;

/// A principal named by a research or registry source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerCandidate {
    pub name: String,
    pub kind: NameKind,
    pub role: Option<String>,
    pub confidence: Confidence,
    pub source: String,
    pub rationale: Option<String>,
}

/// An officer entry from a corporate registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerCandidate {
    pub name: String,
    pub position: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub address: Option<String>,
    pub confidence: Confidence,
    pub source: String,
}

/// One office a person holds, from a registry officer search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerPosition {
    pub name: String,
    pub position: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub address: Option<String>,
    pub company_name: String,
    pub company_number: Option<String>,
    pub jurisdiction: Option<String>,
    pub source: String,
}

/// Home-state parent of a foreign-filed branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchParent {
    pub name: String,
    pub jurisdiction: Option<String>,
    pub company_number: Option<String>,
}

/// Corporate registry record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_number: String,
    pub name: String,
    pub jurisdiction: String,
    pub incorporation_date: Option<String>,
    pub dissolution_date: Option<String>,
    pub company_type: Option<String>,
    pub current_status: Option<String>,
    pub registered_address: Option<String>,
    pub agent_name: Option<String>,
    pub agent_address: Option<String>,
    pub branch: Option<BranchParent>,
    pub officers: Vec<OfficerCandidate>,
    pub previous_names: Vec<String>,
    pub industry_codes: Vec<String>,
    pub registry_url: Option<String>,
}

/// Ownership research about one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityResearch {
    pub owners: Vec<OwnerCandidate>,
    pub summary: Option<String>,
}

/// Input to an outreach rationale request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachContext {
    pub person_name: String,
    pub title: Option<String>,
    pub company: String,
    pub properties: Vec<String>,
}

/// Phone or email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Phone,
    Email,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Phone => "phone",
            ContactKind::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "phone" => Some(ContactKind::Phone),
            "email" => Some(ContactKind::Email),
            _ => None,
        }
    }
}

/// A phone number or email from some provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactCandidate {
    pub kind: ContactKind,
    pub value: String,
    pub source: String,
    pub confidence: Confidence,
    /// `Some(false)` for a constructed guess nobody has confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl ContactCandidate {
    pub fn phone(value: impl Into<String>, source: &str, confidence: Confidence) -> Self {
        Self {
            kind: ContactKind::Phone,
            value: value.into(),
            source: source.to_string(),
            confidence,
            verified: None,
        }
    }

    pub fn email(value: impl Into<String>, source: &str, confidence: Confidence) -> Self {
        Self {
            kind: ContactKind::Email,
            value: value.into(),
            source: source.to_string(),
            confidence,
            verified: None,
        }
    }

    /// Mark as an unconfirmed guess
    pub fn unverified(mut self) -> Self {
        self.verified = Some(false);
        self
    }

    pub fn is_unverified_guess(&self) -> bool {
        self.verified == Some(false)
    }

    /// Dedup form of the value
    ///
    /// Phones reduce to digits with a leading US `1` dropped from 11-digit
    /// numbers; emails are trimmed and lowercased.
    pub fn normalized_value(&self) -> String {
        normalize_contact_value(self.kind, &self.value)
    }
}

pub fn normalize_contact_value(kind: ContactKind, value: &str) -> String {
    match kind {
        ContactKind::Phone => {
            let digits: String = value.chars().filter(char::is_ascii_digit).collect();
            if digits.len() == 11 && digits.starts_with('1') {
                digits[1..].to_string()
            } else {
                digits
            }
        }
        ContactKind::Email => value.trim().to_lowercase(),
    }
}

/// A person found by a people-search or skip-trace source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    pub age: Option<u32>,
    pub birth_date: Option<String>,
    pub current_address: Option<String>,
    pub previous_addresses: Vec<String>,
    pub relatives: Vec<String>,
    pub associates: Vec<String>,
    pub contacts: Vec<ContactCandidate>,
    pub confidence: Confidence,
    pub source: String,
}

/// Lien, lawsuit, bankruptcy or judgment on record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalEventRecord {
    pub kind: String,
    pub external_ref: String,
    pub filed_on: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
}

/// A parcel returned by a property registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub parcel_id: Option<String>,
    pub address: String,
    pub owner_name: Option<String>,
    pub owner_mailing_address: Option<String>,
    pub property_type: Option<String>,
    pub beds: Option<u32>,
    pub baths: Option<f64>,
    pub sqft: Option<u32>,
    pub year_built: Option<u32>,
    pub assessed_value: Option<i64>,
    pub estimated_value: Option<i64>,
    pub last_sale_date: Option<String>,
    pub last_sale_price: Option<i64>,
    pub legal_events: Vec<LegalEventRecord>,
    pub source: String,
}

/// Address as standardized by a verification service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip5: String,
    pub zip4: Option<String>,
    pub deliverable: bool,
}

impl VerifiedAddress {
    pub fn one_line(&self) -> String {
        let street = match &self.line2 {
            Some(unit) => format!("{} {}", self.line1, unit),
            None => self.line1.clone(),
        };
        let zip = match &self.zip4 {
            Some(plus4) => format!("{}-{}", self.zip5, plus4),
            None => self.zip5.clone(),
        };
        format!("{}, {}, {} {}", street, self.city, self.state, zip)
    }
}

/// A decision-maker found in a B2B contact directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryContact {
    pub name: String,
    pub title: Option<String>,
    pub company: Option<String>,
    /// Opaque reference a later `reveal` call turns into phone/email
    pub handle: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub confidence: Confidence,
    pub source: String,
}

/// Result of revealing a directory handle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevealedContact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait PropertyRegistry: Send + Sync {
    fn name(&self) -> &str;

    async fn search_by_address(&self, address: &str) -> ProviderResult<Vec<PropertyRecord>>;

    async fn search_by_owner_name(
        &self,
        name: &str,
        state: Option<&str>,
    ) -> ProviderResult<Vec<PropertyRecord>>;
}

#[async_trait]
pub trait CorporateRegistry: Send + Sync {
    fn name(&self) -> &str;

    async fn search_companies(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
    ) -> ProviderResult<Vec<CompanyRecord>>;

    async fn get_company(
        &self,
        jurisdiction: &str,
        company_number: &str,
    ) -> ProviderResult<Option<CompanyRecord>>;

    /// Offices held under a person's name
    async fn search_officers(
        &self,
        _name: &str,
        _jurisdiction: Option<&str>,
    ) -> ProviderResult<Vec<OfficerPosition>> {
        Ok(Vec::new())
    }
}

#[async_trait]
pub trait AiResearch: Send + Sync {
    fn name(&self) -> &str;

    async fn research_entity_ownership(
        &self,
        name: &str,
        jurisdiction: Option<&str>,
    ) -> ProviderResult<EntityResearch>;

    async fn outreach_rationale(&self, context: &OutreachContext) -> ProviderResult<String>;
}

#[async_trait]
pub trait PeopleSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search_people(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> ProviderResult<Vec<PersonRecord>>;
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    fn name(&self) -> &str;

    async fn search_investors(&self, company: &str) -> ProviderResult<Vec<DirectoryContact>>;

    async fn search_people_by_company(&self, company: &str)
        -> ProviderResult<Vec<DirectoryContact>>;

    async fn reveal(&self, handle: &str) -> ProviderResult<RevealedContact>;
}

#[async_trait]
pub trait AddressVerification: Send + Sync {
    fn name(&self) -> &str;

    async fn verify_address(&self, address: &ParsedAddress) -> ProviderResult<VerifiedAddress>;
}

/// The provider clients a deployment has configured
///
/// Absent clients are `None`; operations that need one skip that source.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub property_registry: Option<Arc<dyn PropertyRegistry>>,
    pub corporate_registry: Option<Arc<dyn CorporateRegistry>>,
    pub ai_research: Option<Arc<dyn AiResearch>>,
    /// Ordered people-search sources (cheapest first)
    pub people_search: Vec<Arc<dyn PeopleSearch>>,
    pub contact_directory: Option<Arc<dyn ContactDirectory>>,
    pub address_verification: Option<Arc<dyn AddressVerification>>,
}

impl ProviderSet {
    pub fn people_search_named(&self, name: &str) -> Option<Arc<dyn PeopleSearch>> {
        self.people_search.iter().find(|p| p.name() == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_contact_value(ContactKind::Phone, "+1 (555) 123-4567"), "5551234567");
        assert_eq!(normalize_contact_value(ContactKind::Phone, "555.123.4567"), "5551234567");
        assert_eq!(normalize_contact_value(ContactKind::Phone, "25551234567"), "25551234567");
    }

    #[test]
    fn test_email_normalization() {
        let c = ContactCandidate::email("  John.Smith@Example.COM ", "x", 90);
        assert_eq!(c.normalized_value(), "john.smith@example.com");
    }

    #[test]
    fn test_only_rate_limit_retries() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::Http { status: 500, body: String::new() }.is_retryable());
        assert_eq!(
            ProviderError::RateLimited { retry_after: Some(Duration::from_secs(2)) }.retry_after(),
            Some(Duration::from_secs(2))
        );
    }
}

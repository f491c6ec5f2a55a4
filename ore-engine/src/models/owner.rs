//! Owners, their contacts and their entity links

use crate::classifier::{classify, NameKind};
use crate::providers::{normalize_contact_value, Confidence, ContactKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Individual,
    Entity,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Individual => "individual",
            OwnerType::Entity => "entity",
        }
    }
}

impl From<NameKind> for OwnerType {
    fn from(kind: NameKind) -> Self {
        match kind {
            NameKind::Person => OwnerType::Individual,
            NameKind::Entity => OwnerType::Entity,
        }
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(OwnerType::Individual),
            "entity" => Ok(OwnerType::Entity),
            other => Err(format!("Unknown owner type: {}", other)),
        }
    }
}

/// Individuals only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub birth_date: Option<String>,
    pub relatives: Vec<String>,
    pub associates: Vec<String>,
    pub previous_addresses: Vec<String>,
}

/// A property owner (person or entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    pub owner_type: OwnerType,
    pub name: String,
    pub aka_names: Vec<String>,
    pub primary_address: Option<String>,
    pub mailing_address: Option<String>,
    /// Registry jurisdiction code for entities ("us_de")
    pub jurisdiction: Option<String>,
    pub company_domain: Option<String>,
    pub risk_flags: Vec<String>,
    pub seller_intent_score: Option<u8>,
    pub contact_confidence: Option<Confidence>,
    pub demographics: Option<Demographics>,
    /// Set when a verified external record fixed the type
    pub type_verified: bool,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owner {
    /// New owner typed by the name classifier
    pub fn new(name: &str, source: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_type: classify(name).into(),
            name: name.trim().to_string(),
            aka_names: Vec::new(),
            primary_address: None,
            mailing_address: None,
            jurisdiction: None,
            company_domain: None,
            risk_flags: Vec::new(),
            seller_intent_score: None,
            contact_confidence: None,
            demographics: None,
            type_verified: false,
            source: source.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    /// Type the persistence layer will store
    pub fn effective_type(&self) -> OwnerType {
        if self.type_verified {
            self.owner_type
        } else {
            classify(&self.name).into()
        }
    }

    pub fn is_entity(&self) -> bool {
        self.owner_type == OwnerType::Entity
    }

    pub fn add_risk_flag(&mut self, flag: &str) {
        if !self.risk_flags.iter().any(|f| f == flag) {
            self.risk_flags.push(flag.to_string());
        }
    }

    pub fn add_aka(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(&self.name) {
            return;
        }
        if !self.aka_names.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            self.aka_names.push(name.to_string());
        }
    }
}

/// A phone or email belonging to one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ContactKind,
    pub value: String,
    pub normalized_value: String,
    pub source: String,
    pub confidence: Confidence,
    pub updated_at: DateTime<Utc>,
}

impl ContactInfo {
    pub fn new(owner_id: Uuid, kind: ContactKind, value: &str, source: &str, confidence: Confidence) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind,
            value: value.trim().to_string(),
            normalized_value: normalize_contact_value(kind, value),
            source: source.to_string(),
            confidence,
            updated_at: Utc::now(),
        }
    }
}

/// Directed edge individual -> entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerLlcLink {
    pub individual_id: Uuid,
    pub entity_id: Uuid,
    /// Officer role or "beneficial owner"
    pub relationship: String,
    pub confidence: Confidence,
    pub rationale: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_owner_is_classified() {
        assert_eq!(Owner::new("ACME HOLDINGS LLC", None).owner_type, OwnerType::Entity);
        assert_eq!(Owner::new("JOHN A SMITH", None).owner_type, OwnerType::Individual);
    }

    #[test]
    fn test_effective_type_respects_verification() {
        let mut owner = Owner::new("JOHN A SMITH", None);
        owner.owner_type = OwnerType::Entity;
        assert_eq!(owner.effective_type(), OwnerType::Individual);
        owner.type_verified = true;
        assert_eq!(owner.effective_type(), OwnerType::Entity);
    }

    #[test]
    fn test_aka_ignores_own_name_and_duplicates() {
        let mut owner = Owner::new("Acme LLC", None);
        owner.add_aka("ACME LLC");
        owner.add_aka("Acme Holdings");
        owner.add_aka("acme holdings");
        assert_eq!(owner.aka_names, vec!["Acme Holdings"]);
    }
}

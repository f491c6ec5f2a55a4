//! Parcels and legal events

use crate::providers::{LegalEventRecord, PropertyRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parcel, weakly linked to its current owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub parcel_id: Option<String>,
    pub address: String,
    pub property_type: Option<String>,
    pub beds: Option<u32>,
    pub baths: Option<f64>,
    pub sqft: Option<u32>,
    pub year_built: Option<u32>,
    pub assessed_value: Option<i64>,
    pub estimated_value: Option<i64>,
    pub last_sale_date: Option<String>,
    pub last_sale_price: Option<i64>,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn from_record(record: &PropertyRecord, owner_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            parcel_id: record.parcel_id.clone(),
            address: record.address.trim().to_string(),
            property_type: record.property_type.clone(),
            beds: record.beds,
            baths: record.baths,
            sqft: record.sqft,
            year_built: record.year_built,
            assessed_value: record.assessed_value,
            estimated_value: record.estimated_value,
            last_sale_date: record.last_sale_date.clone(),
            last_sale_price: record.last_sale_price,
            source: record.source.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Upsert identity: parcel id when known, otherwise the normalized address
    pub fn identity_key(&self) -> String {
        match self.parcel_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(parcel) => format!("PARCEL:{}", parcel.to_uppercase()),
            None => format!(
                "ADDR:{}",
                self.address
                    .to_uppercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        }
    }
}

/// Lien, lawsuit, bankruptcy or judgment (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalEvent {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub kind: String,
    pub external_ref: String,
    pub filed_on: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LegalEvent {
    pub fn from_record(record: &LegalEventRecord, owner_id: Option<Uuid>, property_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            property_id,
            kind: record.kind.to_lowercase(),
            external_ref: record.external_ref.clone(),
            filed_on: record.filed_on.clone(),
            amount: record.amount,
            description: record.description.clone(),
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_parcel() {
        let mut record = PropertyRecord {
            address: "12  Main St,  Austin TX".to_string(),
            ..Default::default()
        };
        let by_address = Property::from_record(&record, None);
        assert_eq!(by_address.identity_key(), "ADDR:12 MAIN ST, AUSTIN TX");

        record.parcel_id = Some(" r-100 ".to_string());
        assert_eq!(Property::from_record(&record, None).identity_key(), "PARCEL:R-100");
    }
}

//! Property lookup waterfall
//!
//! Two steps against the property registry, by address and by owner name. Both
//! always run; each step's answer is cached in the `property` category.

use crate::cache::{CacheCategory, CacheKey, TtlCache};
use crate::providers::{Confidence, PropertyRecord, PropertyRegistry, ProviderResult};
use crate::waterfall::{Accumulator, WaterfallProvider};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct PropertyQuery {
    pub address: Option<String>,
    pub owner_name: String,
    pub state: Option<String>,
}

/// Parcels found so far, deduplicated by parcel id or address
#[derive(Debug, Clone, Default)]
pub struct PropertyFindings {
    pub records: Vec<PropertyRecord>,
}

fn record_key(record: &PropertyRecord) -> String {
    match record.parcel_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(parcel) => format!("P:{}", parcel.to_uppercase()),
        None => format!(
            "A:{}",
            record.address.to_uppercase().split_whitespace().collect::<Vec<_>>().join(" ")
        ),
    }
}

impl Accumulator<Vec<PropertyRecord>> for PropertyFindings {
    fn merge(&mut self, _provider: &str, _floor: Confidence, contribution: &Vec<PropertyRecord>) {
        for record in contribution {
            let key = record_key(record);
            if !self.records.iter().any(|r| record_key(r) == key) {
                self.records.push(record.clone());
            }
        }
    }
}

enum Lookup {
    ByAddress,
    ByOwner,
}

pub struct PropertyStep {
    client: Arc<dyn PropertyRegistry>,
    cache: Arc<TtlCache>,
    lookup: Lookup,
    name: String,
}

impl PropertyStep {
    pub fn by_address(client: Arc<dyn PropertyRegistry>, cache: Arc<TtlCache>) -> Self {
        let name = format!("{}:address", client.name());
        Self {
            client,
            cache,
            lookup: Lookup::ByAddress,
            name,
        }
    }

    pub fn by_owner(client: Arc<dyn PropertyRegistry>, cache: Arc<TtlCache>) -> Self {
        let name = format!("{}:owner", client.name());
        Self {
            client,
            cache,
            lookup: Lookup::ByOwner,
            name,
        }
    }
}

#[async_trait]
impl WaterfallProvider<PropertyQuery, Vec<PropertyRecord>> for PropertyStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn pool(&self) -> &str {
        self.client.name()
    }

    fn stop_on_success(&self) -> bool {
        false
    }

    async fn call(&self, query: &PropertyQuery) -> ProviderResult<Vec<PropertyRecord>> {
        let key = match self.lookup {
            Lookup::ByAddress => match &query.address {
                Some(address) => CacheKey::new(&format!("address:{}", address), None),
                None => return Ok(Vec::new()),
            },
            Lookup::ByOwner => {
                CacheKey::new(&format!("owner:{}", query.owner_name), query.state.as_deref())
            }
        };

        if let Some(cached) = self
            .cache
            .get::<Vec<PropertyRecord>>(CacheCategory::Property, &key)
            .await
        {
            return Ok(cached.value);
        }

        let records = match self.lookup {
            Lookup::ByAddress => {
                let address = query.address.as_deref().unwrap_or_default();
                self.client.search_by_address(address).await?
            }
            Lookup::ByOwner => {
                self.client
                    .search_by_owner_name(&query.owner_name, query.state.as_deref())
                    .await?
            }
        };
        self.cache.put(CacheCategory::Property, &key, &records).await;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_findings_dedup() {
        let mut findings = PropertyFindings::default();
        let a = PropertyRecord {
            parcel_id: Some("r-1".to_string()),
            address: "1 Main St".to_string(),
            ..Default::default()
        };
        let same_parcel = PropertyRecord {
            parcel_id: Some("R-1".to_string()),
            address: "1 MAIN STREET".to_string(),
            ..Default::default()
        };
        let no_parcel = PropertyRecord {
            address: "2  Oak Ave".to_string(),
            ..Default::default()
        };
        findings.merge("x", 0, &vec![a, no_parcel.clone()]);
        findings.merge("y", 0, &vec![same_parcel, no_parcel]);
        assert_eq!(findings.records.len(), 2);
    }
}

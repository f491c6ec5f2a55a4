//! Officer lookups for chain expansion

use crate::llc::{LlcResolver, Principal};
use crate::providers::{BranchParent, OfficerPosition, ProviderResult};
use async_trait::async_trait;

/// Principals of one entity as seen by a single lookup
#[derive(Debug, Clone, Default)]
pub struct OfficerLookup {
    pub principals: Vec<Principal>,
    pub branch_parent: Option<BranchParent>,
    /// Where the matched record is registered, else the scope asked for
    pub jurisdiction: Option<String>,
    /// Paid calls this lookup cost (0 when served from cache)
    pub api_calls: u32,
}

/// Offices one person holds elsewhere
#[derive(Debug, Clone, Default)]
pub struct PositionLookup {
    pub positions: Vec<OfficerPosition>,
    pub api_calls: u32,
}

/// Where the chain walker gets an entity's officers
#[async_trait]
pub trait OfficerSource: Send + Sync {
    async fn lookup(&self, name: &str, jurisdiction: Option<&str>) -> ProviderResult<OfficerLookup>;

    /// Registry offices held by a person found on the chain
    async fn positions(&self, _person: &str, _jurisdiction: Option<&str>) -> ProviderResult<PositionLookup> {
        Ok(PositionLookup::default())
    }
}

#[async_trait]
impl OfficerSource for LlcResolver {
    async fn lookup(&self, name: &str, jurisdiction: Option<&str>) -> ProviderResult<OfficerLookup> {
        let resolution = self.resolve(name, jurisdiction, false).await?;
        let registered = resolution
            .record
            .company
            .as_ref()
            .map(|c| c.jurisdiction.clone())
            .filter(|j| !j.is_empty());
        Ok(OfficerLookup {
            principals: resolution.record.principals(),
            branch_parent: resolution.record.branch_parent().cloned(),
            jurisdiction: registered.or(resolution.record.jurisdiction),
            api_calls: resolution.api_calls,
        })
    }

    async fn positions(&self, person: &str, jurisdiction: Option<&str>) -> ProviderResult<PositionLookup> {
        self.officer_positions(person, jurisdiction).await
    }
}

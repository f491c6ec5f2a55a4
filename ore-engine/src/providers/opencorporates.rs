//! OpenCorporates corporate-registry client
//!
//! REST API v0.4. Officer entries are screened with the officer-name validator
//! before they leave this module, and a branch record's home-state parent is
//! surfaced so the chain resolver can follow it.

use super::{
    BranchParent, CompanyRecord, CorporateRegistry, OfficerCandidate, OfficerPosition,
    ProviderError, ProviderResult,
};
use crate::classifier::{is_valid_officer_name, normalize_name};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub const PROVIDER_NAME: &str = "opencorporates";

const DEFAULT_BASE_URL: &str = "https://api.opencorporates.com/v0.4";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_PER_PAGE: u32 = 30;

/// Registry officers are filed records; confidence reflects that
const OFFICER_CONFIDENCE: u8 = 85;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct OpenCorporatesClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    rate_limiter: DirectLimiter,
}

impl OpenCorporatesClient {
    /// Create a client; `requests_per_second` is clamped to at least 1
    pub fn new(api_token: Option<String>, requests_per_second: u32) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(ore_common::config::get_user_agent())
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(format!("HTTP client build failed: {}", e)))?;

        let per_second = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.filter(|t| !t.trim().is_empty()),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Point the client at another host (staging mirrors, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> ProviderResult<Option<serde_json::Value>> {
        self.rate_limiter.until_ready().await;

        let mut params: Vec<(&str, String)> = query.to_vec();
        if let Some(token) = &self.api_token {
            params.push(("api_token", token.clone()));
        }

        debug!(provider = PROVIDER_NAME, url = %url, "Querying corporate registry");

        let response = self.http_client.get(url).query(&params).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let value = response.json::<serde_json::Value>().await?;
        Ok(Some(value))
    }
}

/// Collapse spaced initialisms and punctuation the registry search chokes on
///
/// "JOHNSTON JAKE L L C" → "JOHNSTON JAKE LLC"
pub fn normalize_search_query(query: &str) -> String {
    normalize_name(query).replace(',', "")
}

#[async_trait]
impl CorporateRegistry for OpenCorporatesClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search_companies(
        &self,
        query: &str,
        jurisdiction: Option<&str>,
    ) -> ProviderResult<Vec<CompanyRecord>> {
        let normalized = normalize_search_query(query);
        let mut params = vec![
            ("q", normalized.clone()),
            ("per_page", SEARCH_PER_PAGE.to_string()),
        ];
        if let Some(code) = jurisdiction {
            params.push(("jurisdiction_code", code.to_lowercase()));
        }

        let url = format!("{}/companies/search", self.base_url);
        let Some(body) = self.get_json(&url, &params).await? else {
            return Ok(Vec::new());
        };

        let companies = parse_search_response(body)?;
        debug!(
            provider = PROVIDER_NAME,
            query = %normalized,
            jurisdiction = ?jurisdiction,
            count = companies.len(),
            "Company search complete"
        );
        Ok(companies)
    }

    async fn get_company(
        &self,
        jurisdiction: &str,
        company_number: &str,
    ) -> ProviderResult<Option<CompanyRecord>> {
        let url = format!(
            "{}/companies/{}/{}",
            self.base_url,
            jurisdiction.to_lowercase(),
            company_number
        );
        match self.get_json(&url, &[]).await? {
            Some(body) => parse_company_response(body).map(Some),
            None => Ok(None),
        }
    }

    async fn search_officers(
        &self,
        name: &str,
        jurisdiction: Option<&str>,
    ) -> ProviderResult<Vec<OfficerPosition>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = vec![
            ("q", name.to_string()),
            ("per_page", SEARCH_PER_PAGE.to_string()),
        ];
        if let Some(code) = jurisdiction {
            params.push(("jurisdiction_code", code.to_lowercase()));
        }

        let url = format!("{}/officers/search", self.base_url);
        let Some(body) = self.get_json(&url, &params).await? else {
            return Ok(Vec::new());
        };

        let positions = parse_officer_search_response(body)?;
        debug!(
            provider = PROVIDER_NAME,
            name,
            jurisdiction = ?jurisdiction,
            count = positions.len(),
            "Officer search complete"
        );
        Ok(positions)
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    companies: Vec<CompanyWrapper>,
}

#[derive(Debug, Deserialize)]
struct CompanyEnvelope {
    results: CompanyWrapper,
}

#[derive(Debug, Deserialize)]
struct CompanyWrapper {
    company: OcCompany,
}

#[derive(Debug, Default, Deserialize)]
struct OcCompany {
    #[serde(default)]
    company_number: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    jurisdiction_code: Option<String>,
    incorporation_date: Option<String>,
    dissolution_date: Option<String>,
    company_type: Option<String>,
    current_status: Option<String>,
    registry_url: Option<String>,
    registered_address_in_full: Option<String>,
    agent_name: Option<String>,
    agent_address: Option<String>,
    branch: Option<OcBranch>,
    #[serde(default)]
    officers: Vec<OfficerWrapper>,
    #[serde(default)]
    previous_names: Vec<OcPreviousName>,
    #[serde(default)]
    industry_codes: Vec<IndustryCodeWrapper>,
}

#[derive(Debug, Deserialize)]
struct OcBranch {
    name: Option<String>,
    jurisdiction_code: Option<String>,
    company_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OfficerWrapper {
    officer: OcOfficer,
}

#[derive(Debug, Deserialize)]
struct OcOfficer {
    #[serde(default)]
    name: String,
    position: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OfficerSearchEnvelope {
    results: OfficerSearchResults,
}

#[derive(Debug, Deserialize)]
struct OfficerSearchResults {
    #[serde(default)]
    officers: Vec<OfficerHitWrapper>,
}

#[derive(Debug, Deserialize)]
struct OfficerHitWrapper {
    officer: OcOfficerHit,
}

#[derive(Debug, Deserialize)]
struct OcOfficerHit {
    #[serde(default)]
    name: String,
    position: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    address: Option<String>,
    company: Option<OcOfficerCompany>,
}

#[derive(Debug, Deserialize)]
struct OcOfficerCompany {
    name: Option<String>,
    company_number: Option<String>,
    jurisdiction_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OcPreviousName {
    Record { company_name: String },
    Plain(String),
}

#[derive(Debug, Deserialize)]
struct IndustryCodeWrapper {
    industry_code: IndustryCode,
}

#[derive(Debug, Deserialize)]
struct IndustryCode {
    code: String,
}

fn parse_search_response(body: serde_json::Value) -> ProviderResult<Vec<CompanyRecord>> {
    let envelope: SearchEnvelope = serde_json::from_value(body)
        .map_err(|e| ProviderError::Malformed(format!("company search: {}", e)))?;
    Ok(envelope
        .results
        .companies
        .into_iter()
        .map(|w| into_record(w.company))
        .collect())
}

fn parse_company_response(body: serde_json::Value) -> ProviderResult<CompanyRecord> {
    let envelope: CompanyEnvelope = serde_json::from_value(body)
        .map_err(|e| ProviderError::Malformed(format!("company fetch: {}", e)))?;
    Ok(into_record(envelope.results.company))
}

/// Valid officer hits tied to a named company
fn parse_officer_search_response(body: serde_json::Value) -> ProviderResult<Vec<OfficerPosition>> {
    let envelope: OfficerSearchEnvelope = serde_json::from_value(body)
        .map_err(|e| ProviderError::Malformed(format!("officer search: {}", e)))?;
    Ok(envelope
        .results
        .officers
        .into_iter()
        .map(|w| w.officer)
        .filter(|o| is_valid_officer_name(&o.name))
        .filter_map(|o| {
            let company = o.company?;
            let company_name = company.name.filter(|n| !n.trim().is_empty())?;
            Some(OfficerPosition {
                name: o.name.trim().to_string(),
                position: o.position,
                start_date: o.start_date,
                end_date: o.end_date,
                address: o.address,
                company_name,
                company_number: company.company_number,
                jurisdiction: company.jurisdiction_code,
                source: PROVIDER_NAME.to_string(),
            })
        })
        .collect())
}

fn into_record(company: OcCompany) -> CompanyRecord {
    let officers = company
        .officers
        .into_iter()
        .map(|w| w.officer)
        .filter(|o| is_valid_officer_name(&o.name))
        .map(|o| OfficerCandidate {
            name: o.name.trim().to_string(),
            position: o.position,
            start_date: o.start_date,
            end_date: o.end_date,
            address: o.address,
            confidence: OFFICER_CONFIDENCE,
            source: PROVIDER_NAME.to_string(),
        })
        .collect();

    let branch = company.branch.and_then(|b| {
        b.name.filter(|n| !n.trim().is_empty()).map(|name| BranchParent {
            name,
            jurisdiction: b.jurisdiction_code,
            company_number: b.company_number,
        })
    });

    CompanyRecord {
        company_number: company.company_number.unwrap_or_default(),
        name: company.name.unwrap_or_default(),
        jurisdiction: company.jurisdiction_code.unwrap_or_default(),
        incorporation_date: company.incorporation_date,
        dissolution_date: company.dissolution_date,
        company_type: company.company_type,
        current_status: company.current_status,
        registered_address: company.registered_address_in_full,
        agent_name: company.agent_name,
        agent_address: company.agent_address,
        branch,
        officers,
        previous_names: company
            .previous_names
            .into_iter()
            .map(|p| match p {
                OcPreviousName::Record { company_name } => company_name,
                OcPreviousName::Plain(name) => name,
            })
            .collect(),
        industry_codes: company
            .industry_codes
            .into_iter()
            .map(|c| c.industry_code.code)
            .collect(),
        registry_url: company.registry_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_query_normalization() {
        assert_eq!(normalize_search_query("Johnston Jake L L C"), "JOHNSTON JAKE LLC");
        assert_eq!(normalize_search_query("Acme, Inc."), "ACME INC");
    }

    #[test]
    fn test_company_parse_filters_officers_and_keeps_branch() {
        let body = json!({
            "results": {
                "company": {
                    "company_number": "L1234",
                    "name": "ACME HOLDINGS LLC",
                    "jurisdiction_code": "us_fl",
                    "current_status": "Active",
                    "branch": {
                        "name": "ACME HOLDINGS LLC",
                        "jurisdiction_code": "us_de",
                        "company_number": "998877"
                    },
                    "officers": [
                        {"officer": {"name": "JOHN A SMITH", "position": "manager"}},
                        {"officer": {"name": "POSITIONS INCLUDE MANAGER", "position": "agent"}},
                        {"officer": {"name": "N/A"}}
                    ],
                    "previous_names": [{"company_name": "ACME PROPERTIES LLC"}],
                    "industry_codes": [{"industry_code": {"code": "6512"}}]
                }
            }
        });

        let record = parse_company_response(body).unwrap();
        assert_eq!(record.jurisdiction, "us_fl");
        assert_eq!(record.officers.len(), 1);
        assert_eq!(record.officers[0].name, "JOHN A SMITH");
        assert_eq!(record.officers[0].source, PROVIDER_NAME);
        let branch = record.branch.unwrap();
        assert_eq!(branch.jurisdiction.as_deref(), Some("us_de"));
        assert_eq!(record.previous_names, vec!["ACME PROPERTIES LLC"]);
        assert_eq!(record.industry_codes, vec!["6512"]);
    }

    #[test]
    fn test_search_parse_tolerates_sparse_companies() {
        let body = json!({
            "results": {
                "companies": [
                    {"company": {"name": "OAK STREET LLC"}},
                    {"company": {"name": "OAK STREET LP", "officers": []}}
                ],
                "total_count": 2
            }
        });
        let companies = parse_search_response(body).unwrap();
        assert_eq!(companies.len(), 2);
        assert!(companies[0].officers.is_empty());
        assert!(companies[0].branch.is_none());
    }

    #[test]
    fn test_officer_search_parse_drops_invalid_and_companyless_hits() {
        let body = json!({
            "results": {
                "officers": [
                    {"officer": {
                        "name": "JOHN A SMITH",
                        "position": "manager",
                        "company": {"name": "OAK STREET LLC", "company_number": "L99", "jurisdiction_code": "us_fl"}
                    }},
                    {"officer": {"name": "UNKNOWN", "company": {"name": "ELM LLC"}}},
                    {"officer": {"name": "JOHN SMITH"}}
                ]
            }
        });
        let positions = parse_officer_search_response(body).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].company_name, "OAK STREET LLC");
        assert_eq!(positions[0].jurisdiction.as_deref(), Some("us_fl"));
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_search_response(json!({"unexpected": true})).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}

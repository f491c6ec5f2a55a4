//! Registry client against a stub HTTP server

mod helpers;

use helpers::TestEngine;
use ore_engine::providers::{CorporateRegistry, OpenCorporatesClient, ProviderError, ProviderSet};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenCorporatesClient {
    OpenCorporatesClient::new(None, 50)
        .expect("client builds")
        .with_base_url(server.uri())
}

fn officer_hits() -> serde_json::Value {
    json!({
        "results": {
            "officers": [
                {"officer": {
                    "name": "JOHN A SMITH",
                    "position": "director",
                    "start_date": "2015-03-01",
                    "company": {"name": "ELM STREET PROPERTIES LLC", "company_number": "L55", "jurisdiction_code": "us_fl"}
                }},
                {"officer": {
                    "name": "JOHN A SMITH",
                    "position": "manager",
                    "company": {"name": "ACME HOLDINGS LLC", "company_number": "L1234", "jurisdiction_code": "us_fl"}
                }},
                {"officer": {"name": "N/A", "company": {"name": "GHOST LLC"}}}
            ],
            "total_count": 3
        }
    })
}

#[tokio::test]
async fn test_search_officers_sends_query_and_parses_positions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/officers/search"))
        .and(query_param("q", "John A Smith"))
        .and(query_param("jurisdiction_code", "us_fl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(officer_hits()))
        .expect(1)
        .mount(&server)
        .await;

    let positions = client(&server)
        .search_officers("John A Smith", Some("US_FL"))
        .await
        .unwrap();

    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].company_name, "ELM STREET PROPERTIES LLC");
    assert_eq!(positions[0].position.as_deref(), Some("director"));
    assert_eq!(positions[0].company_number.as_deref(), Some("L55"));
    assert_eq!(positions[0].source, "opencorporates");
}

#[tokio::test]
async fn test_search_officers_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/officers/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = client(&server).search_officers("John A Smith", None).await.unwrap_err();
    match err {
        ProviderError::RateLimited { retry_after } => assert_eq!(retry_after, Some(Duration::from_secs(7))),
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chain_records_other_offices_of_beneficial_owner() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/companies/search"))
        .and(query_param("q", "ACME HOLDINGS LLC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": {
                "companies": [{"company": {
                    "name": "ACME HOLDINGS LLC",
                    "company_number": "L1234",
                    "jurisdiction_code": "us_fl",
                    "officers": [{"officer": {"name": "JOHN A SMITH", "position": "manager"}}]
                }}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/officers/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(officer_hits()))
        .expect(1)
        .mount(&server)
        .await;

    let env = TestEngine::new(ProviderSet {
        corporate_registry: Some(Arc::new(client(&server)) as Arc<dyn CorporateRegistry>),
        ..Default::default()
    })
    .await;

    let chain = env
        .engine
        .resolve_ownership_chain("ACME HOLDINGS LLC", Some("us_fl"), false)
        .await;

    assert_eq!(chain.ultimate_beneficial_owners.len(), 1);
    let john = &chain.ultimate_beneficial_owners[0];
    assert_eq!(john.name, "John A Smith");
    // the root itself is on the chain, so only the other company is kept
    assert_eq!(john.other_companies, vec!["ELM STREET PROPERTIES LLC"]);
}

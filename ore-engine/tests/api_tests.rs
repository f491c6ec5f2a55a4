//! HTTP API tests driven through the router with `oneshot`

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::{MockDirectory, MockResearch, TestEngine};
use http_body_util::BodyExt;
use ore_engine::providers::{AiResearch, ContactDirectory, ProviderSet};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let (status, body) = send(env.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "ore-engine");
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_health_reports_last_phase_failure() {
    let env = TestEngine::new(ProviderSet {
        ai_research: Some(MockResearch::failing() as Arc<dyn AiResearch>),
        ..Default::default()
    })
    .await;

    let (status, owner) = send(env.router(), post_json("/owners", json!({"name": "Acme Holdings LLC"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = owner["id"].as_str().unwrap().parse().unwrap();
    env.engine
        .run_phased_enrichment(id, ore_engine::contacts::ContactTier::Basic)
        .await
        .unwrap();

    let (_, body) = send(env.router(), get("/health")).await;
    assert_eq!(body["last_error"]["origin"], "phase:ownership_chain");
    assert!(body["last_error"]["message"].as_str().unwrap().contains(owner["id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_create_owner_and_missing_dossier() {
    let env = TestEngine::new(ProviderSet::default()).await;

    let (status, owner) = send(
        env.router(),
        post_json("/owners", json!({"name": "Acme Holdings LLC", "jurisdiction": "US_TX"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(owner["owner_type"], "entity");
    assert_eq!(owner["jurisdiction"], "us_tx");

    let id = owner["id"].as_str().unwrap();
    let (status, fetched) = send(env.router(), get(&format!("/owners/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], owner["name"]);

    let (status, body) = send(env.router(), get(&format!("/owners/{}/dossier", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_blank_owner_name_is_bad_request() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let (status, body) = send(env.router(), post_json("/owners", json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_enrich_then_dossier() {
    let env = TestEngine::new(ProviderSet {
        ai_research: Some(MockResearch::with_owners(&[("JOHN A SMITH", 90)]) as Arc<dyn AiResearch>),
        ..Default::default()
    })
    .await;

    let (_, owner) = send(env.router(), post_json("/owners", json!({"name": "Acme Holdings LLC"}))).await;
    let id = owner["id"].as_str().unwrap().to_string();

    let (status, report) = send(
        env.router(),
        post_json(&format!("/owners/{}/enrich", id), json!({"tier": "basic"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["steps"].as_array().unwrap().len(), 6);

    let (status, dossier) = send(env.router(), get(&format!("/owners/{}/dossier", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dossier["report"]["owner"]["id"], id.as_str());
    assert!(dossier["age_hours"].as_f64().unwrap() < 1.0);
}

#[tokio::test]
async fn test_enrich_unknown_owner_is_not_found() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let uri = format!("/owners/{}/enrich", uuid::Uuid::new_v4());
    let (status, _) = send(env.router(), post_json(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_llc_resolve_without_provider_is_unavailable() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let (status, body) = send(env.router(), get("/llc/resolve?name=Acme%20Holdings%20LLC")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "PROVIDER_NOT_CONFIGURED");
}

#[tokio::test]
async fn test_llc_resolve_and_cache_stats() {
    let env = TestEngine::new(ProviderSet {
        ai_research: Some(MockResearch::with_owners(&[("JOHN A SMITH", 90)]) as Arc<dyn AiResearch>),
        ..Default::default()
    })
    .await;

    let uri = "/llc/resolve?name=Acme%20Holdings%20LLC&jurisdiction=us_tx";
    let (status, first) = send(env.router(), get(uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["from_cache"], false);

    let (_, second) = send(env.router(), get(uri)).await;
    assert_eq!(second["from_cache"], true);

    let (status, stats) = send(env.router(), get("/cache/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let llc = stats["categories"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["category"] == "llc")
        .unwrap()
        .clone();
    assert_eq!(llc["hits"], 1);
    assert_eq!(llc["ttl_hours"], 72);
}

#[tokio::test]
async fn test_missing_name_is_bad_request() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let (status, _) = send(env.router(), get("/chains/resolve?name=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_endpoints() {
    let env = TestEngine::new(ProviderSet {
        contact_directory: Some(MockDirectory::new(&[]) as Arc<dyn ContactDirectory>),
        ..Default::default()
    })
    .await;

    let (status, job) = send(
        env.router(),
        post_json(
            "/jobs",
            json!({"targets": [{"company": "Lone Star Rentals"}, {"company": "Hill Country Homes"}], "reveal": false}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(job["total_targets"], 2);
    let id = job["id"].as_str().unwrap().to_string();

    env.engine.wait_for_jobs().await;

    let (status, finished) = send(env.router(), get(&format!("/jobs/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finished["status"], "succeeded");
    assert_eq!(finished["processed_targets"], 2);

    let (status, results) = send(env.router(), get(&format!("/jobs/{}/results", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results.as_array().unwrap().len(), 2);

    let (status, _) = send(env.router(), get(&format!("/jobs/{}", uuid::Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_job_is_bad_request() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let (status, _) = send(env.router(), post_json("/jobs", json!({"targets": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

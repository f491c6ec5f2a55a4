//! Lookup endpoints: LLC, ownership chain, contact waterfall, cache counters

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::cache::CacheStats;
use crate::chain::ChainResult;
use crate::contacts::{ContactQuery, ContactTier, ContactWaterfallResult};
use crate::error::{ApiError, ApiResult};
use crate::llc::LlcResolution;
use crate::AppState;

/// Query string of the resolve endpoints
#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub name: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// Bypass the cache
    #[serde(default)]
    pub refresh: bool,
}

impl ResolveParams {
    fn validated(&self) -> ApiResult<(&str, Option<&str>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("name is required".to_string()));
        }
        let jurisdiction = self
            .jurisdiction
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty());
        Ok((name, jurisdiction))
    }
}

/// POST /contacts/waterfall body
#[derive(Debug, Deserialize)]
pub struct ContactWaterfallRequest {
    #[serde(flatten)]
    pub query: ContactQuery,
    #[serde(default)]
    pub tier: ContactTier,
}

/// GET /llc/resolve
pub async fn resolve_llc(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> ApiResult<Json<LlcResolution>> {
    let (name, jurisdiction) = params.validated()?;
    let resolution = state
        .engine
        .resolve_llc(name, jurisdiction, params.refresh)
        .await?;
    Ok(Json(resolution))
}

/// GET /chains/resolve
pub async fn resolve_chain(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> ApiResult<Json<ChainResult>> {
    let (name, jurisdiction) = params.validated()?;
    Ok(Json(
        state
            .engine
            .resolve_ownership_chain(name, jurisdiction, params.refresh)
            .await,
    ))
}

/// POST /contacts/waterfall
pub async fn contact_waterfall(
    State(state): State<AppState>,
    Json(request): Json<ContactWaterfallRequest>,
) -> ApiResult<Json<ContactWaterfallResult>> {
    if request.query.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    Ok(Json(
        state
            .engine
            .run_contact_waterfall(&request.query, request.tier)
            .await,
    ))
}

/// GET /cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.engine.cache_stats())
}

pub fn resolve_routes() -> Router<AppState> {
    Router::new()
        .route("/llc/resolve", get(resolve_llc))
        .route("/chains/resolve", get(resolve_chain))
        .route("/contacts/waterfall", post(contact_waterfall))
        .route("/cache/stats", get(cache_stats))
}

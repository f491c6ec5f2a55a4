//! Owner endpoints: registration, phased enrichment, dossier

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contacts::ContactTier;
use crate::engine::NewOwner;
use crate::enrichment::EnrichmentReport;
use crate::error::{ApiError, ApiResult};
use crate::models::Owner;
use crate::AppState;

/// POST /owners/:id/enrich body (optional)
#[derive(Debug, Default, Deserialize)]
pub struct EnrichRequest {
    #[serde(default)]
    pub tier: ContactTier,
}

/// GET /owners/:id/dossier response
#[derive(Debug, Serialize)]
pub struct DossierResponse {
    pub report: EnrichmentReport,
    pub cached_at: DateTime<Utc>,
    pub age_hours: f64,
}

/// POST /owners
pub async fn create_owner(
    State(state): State<AppState>,
    Json(request): Json<NewOwner>,
) -> ApiResult<(StatusCode, Json<Owner>)> {
    let owner = state.engine.create_owner(request).await?;
    Ok((StatusCode::CREATED, Json(owner)))
}

/// GET /owners/:id
pub async fn get_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> ApiResult<Json<Owner>> {
    state
        .engine
        .get_owner(owner_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Owner not found: {}", owner_id)))
}

/// POST /owners/:id/enrich
///
/// Runs every phase before answering; phase failures are reported in the body
/// rather than as an HTTP error.
pub async fn enrich_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
    request: Option<Json<EnrichRequest>>,
) -> ApiResult<Json<EnrichmentReport>> {
    let tier = request.map(|Json(r)| r.tier).unwrap_or_default();
    let report = state.engine.run_phased_enrichment(owner_id, tier).await?;
    Ok(Json(report))
}

/// GET /owners/:id/dossier
pub async fn get_dossier(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> ApiResult<Json<DossierResponse>> {
    let cached = state
        .engine
        .get_dossier(owner_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No fresh dossier for owner {}", owner_id)))?;
    Ok(Json(DossierResponse {
        report: cached.value,
        cached_at: cached.cached_at,
        age_hours: cached.age_hours,
    }))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/owners", post(create_owner))
        .route("/owners/:id", get(get_owner))
        .route("/owners/:id/enrich", post(enrich_owner))
        .route("/owners/:id/dossier", get(get_dossier))
}

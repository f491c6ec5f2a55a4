//! Bulk job endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{BulkJob, BulkJobConfig, BulkResult};
use crate::AppState;

/// POST /jobs
///
/// Returns 202 Accepted; targets are processed in the background.
pub async fn create_job(
    State(state): State<AppState>,
    Json(config): Json<BulkJobConfig>,
) -> ApiResult<(StatusCode, Json<BulkJob>)> {
    let job = state.engine.create_bulk_enrichment_job(config).await?;
    tracing::info!(job_id = %job.id, total_targets = job.total_targets, "Bulk job accepted");
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<BulkJob>> {
    state
        .engine
        .get_job_status(job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))
}

/// GET /jobs/:id/results
pub async fn get_job_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Vec<BulkResult>>> {
    Ok(Json(state.engine.list_job_results(job_id).await?))
}

/// POST /jobs/:id/reprocess
pub async fn reprocess_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<BulkJob>)> {
    let job = state.engine.reprocess_job(job_id).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/results", get(get_job_results))
        .route("/jobs/:id/reprocess", post(reprocess_job))
}

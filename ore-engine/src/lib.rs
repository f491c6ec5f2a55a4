//! ore-engine library interface
//!
//! Owner Resolution Engine: resolves property owners (people and LLCs) to the
//! decision-makers behind them, with cached provider lookups, ownership chain
//! traversal, contact waterfalls and bulk enrichment jobs.

pub mod address;
pub mod api;
pub mod bulk;
pub mod cache;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod contacts;
pub mod db;
pub mod diagnostics;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod llc;
pub mod models;
pub mod providers;
pub mod utils;
pub mod waterfall;

pub use crate::diagnostics::LastError;
pub use crate::engine::Engine;
pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use ore_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub engine: Arc<Engine>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Shared with the engine's pipelines
    pub last_error: LastError,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, engine: Arc<Engine>) -> Self {
        Self {
            db,
            event_bus,
            startup_time: Utc::now(),
            last_error: engine.last_error().clone(),
            engine,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::resolve_routes())
        .merge(api::owner_routes())
        .merge(api::job_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

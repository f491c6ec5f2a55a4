//! HTTP API handlers for ore-engine

pub mod health;
pub mod jobs;
pub mod owners;
pub mod resolve;
pub mod sse;

pub use health::health_routes;
pub use jobs::job_routes;
pub use owners::owner_routes;
pub use resolve::resolve_routes;
pub use sse::event_stream;

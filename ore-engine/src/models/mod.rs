//! Persisted data model

pub mod job;
pub mod owner;
pub mod property;

pub use job::{
    BulkJob, BulkJobConfig, BulkResult, BulkTarget, BulkTargetInput, JobStatus, PassStatus,
    PostPass, TargetStatus,
};
pub use owner::{ContactInfo, Demographics, Owner, OwnerLlcLink, OwnerType};
pub use property::{LegalEvent, Property};

/// Parse a stored RFC 3339 timestamp
pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> ore_common::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| ore_common::Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Parse a stored UUID
pub(crate) fn parse_uuid(column: &str, value: &str) -> ore_common::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| ore_common::Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

//! Most recent failure, kept for the health endpoint

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// Where it happened ("bulk_job", "phase:contact_waterfall", ...)
    pub origin: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Shared slot; later failures overwrite earlier ones
#[derive(Debug, Clone, Default)]
pub struct LastError(Arc<RwLock<Option<ErrorRecord>>>);

impl LastError {
    pub async fn record(&self, origin: &str, message: impl Into<String>) {
        let record = ErrorRecord {
            origin: origin.to_string(),
            message: message.into(),
            at: Utc::now(),
        };
        debug!(origin, message = %record.message, "Last error updated");
        *self.0.write().await = Some(record);
    }

    pub async fn get(&self) -> Option<ErrorRecord> {
        self.0.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_failure_wins() {
        let last_error = LastError::default();
        assert!(last_error.get().await.is_none());

        last_error.record("bulk_job", "disk full").await;
        let shared = last_error.clone();
        shared.record("phase:ownership_chain", "registry down").await;

        let latest = last_error.get().await.unwrap();
        assert_eq!(latest.origin, "phase:ownership_chain");
        assert_eq!(latest.message, "registry down");
    }
}

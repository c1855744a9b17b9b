//! Analysis status derivation
//!
//! Status is derived, not authoritative: it is recomputed from the persisted
//! analysis record's fields and cached for an hour under
//! `analysis:{id}:status`.

use crate::cache::CacheStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// TTL for cached statuses
pub const STATUS_TTL: Duration = Duration::from_secs(3_600);

/// Lifecycle stage of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Created but not started
    Pending,
    /// Fetch/generation underway
    Processing,
    /// Summary and features are persisted
    Completed,
    /// The record could not be found or read
    Failed,
}

/// Derived progress of an analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    /// Lifecycle stage
    pub status: StatusKind,
    /// Progress percentage
    pub progress: u8,
    /// Optional failure explanation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalysisStatus {
    fn new(status: StatusKind, progress: u8) -> Self {
        Self {
            status,
            progress,
            message: None,
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            status: StatusKind::Failed,
            progress: 0,
            message: Some(message.to_string()),
        }
    }
}

/// A persisted analysis record, as far as status derivation cares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Record identifier
    pub id: String,
    /// Persisted summary, present once generation finished
    pub summary: Option<String>,
    /// Persisted features, present once generation finished
    pub features: Option<Value>,
    /// When the record was created
    pub created_at: Option<DateTime<Utc>>,
}

/// Narrow read contract against the persistence collaborator
#[async_trait]
pub trait AnalysisRecordStore: Send + Sync {
    /// Looks up one analysis record by id
    async fn find(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>>;
}

fn status_key(analysis_id: &str) -> String {
    format!("analysis:{}:status", analysis_id)
}

/// Derives the status of an analysis, consulting the status cache first
///
/// Never fails: lookup errors produce a `failed` status with a message.
pub async fn analysis_status(
    records: &dyn AnalysisRecordStore,
    cache: &dyn CacheStore,
    analysis_id: &str,
) -> AnalysisStatus {
    let record = match records.find(analysis_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return AnalysisStatus::failed("Analysis not found"),
        Err(err) => {
            warn!("Failed to look up analysis {}: {}", analysis_id, err);
            return AnalysisStatus::failed("Failed to get analysis status");
        }
    };

    if let Some(cached) = read_cached_status(cache, analysis_id).await {
        return cached;
    }

    let status = if record.summary.is_some() && record.features.is_some() {
        AnalysisStatus::new(StatusKind::Completed, 100)
    } else if record.created_at.is_some() {
        AnalysisStatus::new(StatusKind::Processing, 50)
    } else {
        AnalysisStatus::new(StatusKind::Pending, 0)
    };

    write_cached_status(cache, analysis_id, &status).await;
    status
}

async fn read_cached_status(cache: &dyn CacheStore, analysis_id: &str) -> Option<AnalysisStatus> {
    let key = status_key(analysis_id);
    match cache.get(&key).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
        Ok(None) => None,
        Err(err) => {
            warn!("Status cache read failed for {}: {}", key, err);
            None
        }
    }
}

async fn write_cached_status(cache: &dyn CacheStore, analysis_id: &str, status: &AnalysisStatus) {
    let key = status_key(analysis_id);
    let serialized = match serde_json::to_string(status) {
        Ok(serialized) => serialized,
        Err(_) => return,
    };
    if let Err(err) = cache.set_ex(&key, STATUS_TTL, &serialized).await {
        warn!("Status cache write failed for {}: {}", key, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::AnalysisError;

    struct FixedRecords(Option<AnalysisRecord>);

    #[async_trait]
    impl AnalysisRecordStore for FixedRecords {
        async fn find(&self, _analysis_id: &str) -> Result<Option<AnalysisRecord>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRecords;

    #[async_trait]
    impl AnalysisRecordStore for FailingRecords {
        async fn find(&self, _analysis_id: &str) -> Result<Option<AnalysisRecord>> {
            Err(AnalysisError::new("database down"))
        }
    }

    fn record(summary: Option<&str>, features: bool, created: bool) -> AnalysisRecord {
        AnalysisRecord {
            id: "a1".to_string(),
            summary: summary.map(str::to_string),
            features: features.then(|| serde_json::json!([])),
            created_at: created.then(Utc::now),
        }
    }

    #[tokio::test]
    async fn test_completed_status() {
        let records = FixedRecords(Some(record(Some("done"), true, true)));
        let cache = MemoryStore::new();
        let status = analysis_status(&records, &cache, "a1").await;
        assert_eq!(status.status, StatusKind::Completed);
        assert_eq!(status.progress, 100);

        // Derivation is cached under the fixed key
        let cached = cache.get("analysis:a1:status").await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn test_processing_and_pending() {
        let cache = MemoryStore::new();

        let records = FixedRecords(Some(record(None, false, true)));
        let status = analysis_status(&records, &cache, "a2").await;
        assert_eq!(status.status, StatusKind::Processing);
        assert_eq!(status.progress, 50);

        let records = FixedRecords(Some(record(None, false, false)));
        let status = analysis_status(&records, &cache, "a3").await;
        assert_eq!(status.status, StatusKind::Pending);
        assert_eq!(status.progress, 0);
    }

    #[tokio::test]
    async fn test_missing_and_failing_lookups() {
        let cache = MemoryStore::new();

        let status = analysis_status(&FixedRecords(None), &cache, "nope").await;
        assert_eq!(status.status, StatusKind::Failed);

        let status = analysis_status(&FailingRecords, &cache, "a1").await;
        assert_eq!(status.status, StatusKind::Failed);
        assert!(status.message.is_some());
    }

    #[tokio::test]
    async fn test_cached_status_wins() {
        let cache = MemoryStore::new();
        let cached = AnalysisStatus::new(StatusKind::Processing, 50);
        cache
            .set_ex(
                "analysis:a9:status",
                STATUS_TTL,
                &serde_json::to_string(&cached).unwrap(),
            )
            .await
            .unwrap();

        // Record says completed, but the cached derivation is returned
        let records = FixedRecords(Some(record(Some("done"), true, true)));
        let status = analysis_status(&records, &cache, "a9").await;
        assert_eq!(status.status, StatusKind::Processing);
    }
}

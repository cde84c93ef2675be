//! Decides whether every unit of a job has produced its output.

use std::sync::Arc;

use tracing;

use alr_core::error::AppError;
use alr_core::result::AppResult;
use alr_database::JobStore;
use alr_entity::job::{JobId, JobStatus};

/// Completion check over job and job key counts.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    store: Arc<dyn JobStore>,
}

impl CompletionDetector {
    /// Create a detector reading from `store`.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Whether the job is done and may be finalized.
    ///
    /// A job that is already `Completed` is complete. `Cancelled` and
    /// `Failed` jobs never are, whatever their key count. Otherwise the job
    /// is complete once the number of distinct units that recorded keys
    /// reaches `job_count`; overshooting is logged and still counts.
    pub async fn is_complete(&self, job_id: JobId) -> AppResult<bool> {
        let job = self
            .store
            .get_job_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))?;

        match job.status {
            JobStatus::Completed => return Ok(true),
            JobStatus::Cancelled | JobStatus::Failed => {
                tracing::warn!(
                    job_id = job.id,
                    status = %job.status,
                    "Job ended before all units finished, not marking complete"
                );
                return Ok(false);
            }
            JobStatus::Pending | JobStatus::InProgress => {}
        }

        let completed = self.store.get_unique_job_key_count(job_id).await?;
        let expected = i64::from(job.job_count);

        if completed > expected {
            tracing::warn!(
                job_id = job.id,
                job_count = expected,
                completed_job_count = completed,
                "Excess number of units completed"
            );
        }

        Ok(completed >= expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alr_core::error::ErrorKind;
    use alr_database::MemoryJobStore;
    use alr_entity::job::NewJobKey;

    async fn record_units(store: &MemoryJobStore, job_id: i64, units: &[i64]) {
        for unit in units {
            store
                .create_job_key(&NewJobKey {
                    job_id,
                    que_job_id: Some(*unit),
                    file_name: format!("{unit}.ndjson"),
                    resource_type: "ALR".to_string(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_incomplete_until_all_units_recorded() {
        let store = MemoryJobStore::new();
        store.insert_job(7, 2, JobStatus::InProgress).await;
        let detector = CompletionDetector::new(Arc::new(store.clone()));

        record_units(&store, 7, &[1]).await;
        assert!(!detector.is_complete(JobId(7)).await.unwrap());

        record_units(&store, 7, &[2]).await;
        assert!(detector.is_complete(JobId(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_keys_from_one_unit_count_once() {
        let store = MemoryJobStore::new();
        store.insert_job(7, 2, JobStatus::InProgress).await;
        record_units(&store, 7, &[1, 1, 1]).await;

        let detector = CompletionDetector::new(Arc::new(store));
        assert!(!detector.is_complete(JobId(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_excess_units_still_complete() {
        let store = MemoryJobStore::new();
        store.insert_job(10, 1, JobStatus::InProgress).await;
        record_units(&store, 10, &[1, 2, 3]).await;

        let detector = CompletionDetector::new(Arc::new(store));
        assert!(detector.is_complete(JobId(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_failures_never_complete() {
        let store = MemoryJobStore::new();
        store.insert_job(11, 1, JobStatus::Cancelled).await;
        store.insert_job(12, 1, JobStatus::Failed).await;
        record_units(&store, 11, &[1, 2]).await;
        record_units(&store, 12, &[1, 2]).await;

        let detector = CompletionDetector::new(Arc::new(store));
        assert!(!detector.is_complete(JobId(11)).await.unwrap());
        assert!(!detector.is_complete(JobId(12)).await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_job_is_complete_without_keys() {
        let store = MemoryJobStore::new();
        store.insert_job(13, 4, JobStatus::Completed).await;

        let detector = CompletionDetector::new(Arc::new(store));
        assert!(detector.is_complete(JobId(13)).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_job_is_an_error() {
        let detector = CompletionDetector::new(Arc::new(MemoryJobStore::new()));
        let err = detector.is_complete(JobId(99)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}

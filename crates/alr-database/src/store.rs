//! Job store contract shared by the handler, watcher, and completion detector.

use async_trait::async_trait;

use alr_core::result::AppResult;
use alr_entity::job::{Job, JobId, JobKey, JobStatus, NewJobKey};

/// Result of a status update.
///
/// A guarded update whose precondition did not hold is reported as
/// [`UpdateOutcome::NotApplied`] instead of an error; under concurrent
/// delivery that is the expected case for every unit but the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A row matched and was updated.
    Applied,
    /// No row matched the update's conditions.
    NotApplied,
}

impl UpdateOutcome {
    /// Map an affected-row count to an outcome.
    pub fn from_rows_affected(rows: u64) -> Self {
        if rows == 0 {
            Self::NotApplied
        } else {
            Self::Applied
        }
    }

    /// Whether the update took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Access to the `jobs` and `job_keys` tables.
///
/// Every method is a single statement; the guarded status update is the
/// only concurrency-control primitive.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch a job. `None` when no such job exists.
    async fn get_job_by_id(&self, job_id: JobId) -> AppResult<Option<Job>>;

    /// Fetch the key a given queue message recorded for a job, if any.
    async fn get_job_key(&self, job_id: JobId, que_job_id: i64) -> AppResult<Option<JobKey>>;

    /// Set a job's status regardless of its current value.
    async fn update_job_status(&self, job_id: JobId, new: JobStatus) -> AppResult<UpdateOutcome>;

    /// Set a job's status only if it is currently `current` (compare-and-set).
    async fn update_job_status_check_status(
        &self,
        job_id: JobId,
        current: JobStatus,
        new: JobStatus,
    ) -> AppResult<UpdateOutcome>;

    /// Set a job's status only if it has not reached a terminal status.
    async fn finalize_job_status(&self, job_id: JobId, new: JobStatus) -> AppResult<UpdateOutcome>;

    /// Number of distinct queue messages that recorded keys for a job.
    async fn get_unique_job_key_count(&self, job_id: JobId) -> AppResult<i64>;

    /// Number of keys for a job, not counting error artifacts.
    async fn get_job_key_count(&self, job_id: JobId) -> AppResult<i64>;

    /// Record one produced artifact.
    async fn create_job_key(&self, key: &NewJobKey) -> AppResult<()>;

    /// Record several produced artifacts in one insert.
    async fn create_job_keys(&self, keys: &[NewJobKey]) -> AppResult<()>;
}

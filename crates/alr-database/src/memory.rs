//! In-memory job store using a Tokio mutex.
//!
//! Every operation takes the lock once, so the guarded status update is as
//! atomic here as the single-statement UPDATE is in Postgres. Suitable for
//! tests and single-process runs only.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use alr_core::error::AppError;
use alr_core::result::AppResult;
use alr_entity::job::{Job, JobId, JobKey, JobStatus, NewJobKey};

use crate::store::{JobStore, UpdateOutcome};

#[derive(Debug, Default)]
struct InnerState {
    jobs: HashMap<i64, Job>,
    keys: Vec<JobKey>,
    next_key_id: i64,
    unavailable: bool,
}

impl InnerState {
    fn check_available(&self) -> AppResult<()> {
        if self.unavailable {
            return Err(AppError::database("Job store unavailable"));
        }
        Ok(())
    }
}

/// In-memory [`JobStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a job row and return it.
    pub async fn insert_job(&self, id: i64, job_count: i32, status: JobStatus) -> Job {
        let now = Utc::now();
        let job = Job {
            id,
            aco_id: Uuid::new_v4(),
            request_url: format!("/api/v1/alr/$export?job={id}"),
            status,
            transaction_time: Some(now),
            job_count,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.jobs.insert(id, job.clone());
        job
    }

    /// Snapshot of a job row.
    pub async fn job(&self, id: i64) -> Option<Job> {
        self.state.lock().await.jobs.get(&id).cloned()
    }

    /// Snapshot of every key recorded for a job.
    pub async fn job_keys(&self, id: i64) -> Vec<JobKey> {
        self.state
            .lock()
            .await
            .keys
            .iter()
            .filter(|k| k.job_id == id)
            .cloned()
            .collect()
    }

    /// Make every subsequent operation fail with a database error.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    async fn set_status_where<F>(&self, job_id: JobId, new: JobStatus, guard: F) -> AppResult<UpdateOutcome>
    where
        F: FnOnce(JobStatus) -> bool + Send,
    {
        let id = job_id.to_db()?;
        let mut state = self.state.lock().await;
        state.check_available()?;

        match state.jobs.get_mut(&id) {
            Some(job) if guard(job.status) => {
                job.status = new;
                job.updated_at = Utc::now();
                Ok(UpdateOutcome::Applied)
            }
            _ => Ok(UpdateOutcome::NotApplied),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job_by_id(&self, job_id: JobId) -> AppResult<Option<Job>> {
        let id = job_id.to_db()?;
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.jobs.get(&id).cloned())
    }

    async fn get_job_key(&self, job_id: JobId, que_job_id: i64) -> AppResult<Option<JobKey>> {
        let id = job_id.to_db()?;
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .keys
            .iter()
            .find(|k| k.job_id == id && k.que_job_id == Some(que_job_id))
            .cloned())
    }

    async fn update_job_status(&self, job_id: JobId, new: JobStatus) -> AppResult<UpdateOutcome> {
        self.set_status_where(job_id, new, |_| true).await
    }

    async fn update_job_status_check_status(
        &self,
        job_id: JobId,
        current: JobStatus,
        new: JobStatus,
    ) -> AppResult<UpdateOutcome> {
        self.set_status_where(job_id, new, move |status| status == current)
            .await
    }

    async fn finalize_job_status(&self, job_id: JobId, new: JobStatus) -> AppResult<UpdateOutcome> {
        self.set_status_where(job_id, new, |status| !status.is_terminal())
            .await
    }

    async fn get_unique_job_key_count(&self, job_id: JobId) -> AppResult<i64> {
        let id = job_id.to_db()?;
        let state = self.state.lock().await;
        state.check_available()?;

        // COUNT(DISTINCT ...) ignores NULLs
        let mut units: Vec<i64> = state
            .keys
            .iter()
            .filter(|k| k.job_id == id)
            .filter_map(|k| k.que_job_id)
            .collect();
        units.sort_unstable();
        units.dedup();
        Ok(units.len() as i64)
    }

    async fn get_job_key_count(&self, job_id: JobId) -> AppResult<i64> {
        let id = job_id.to_db()?;
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .keys
            .iter()
            .filter(|k| k.job_id == id && !k.is_error_file())
            .count() as i64)
    }

    async fn create_job_key(&self, key: &NewJobKey) -> AppResult<()> {
        self.create_job_keys(std::slice::from_ref(key)).await
    }

    async fn create_job_keys(&self, keys: &[NewJobKey]) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.check_available()?;

        for key in keys {
            // same uniqueness as the Postgres index; NULL units never collide
            let duplicate = key.que_job_id.is_some()
                && state.keys.iter().any(|k| {
                    k.job_id == key.job_id
                        && k.que_job_id == key.que_job_id
                        && k.file_name == key.file_name
                });
            if duplicate {
                continue;
            }
            state.next_key_id += 1;
            let id = state.next_key_id;
            state.keys.push(JobKey {
                id,
                job_id: key.job_id,
                que_job_id: key.que_job_id,
                file_name: key.file_name.clone(),
                resource_type: key.resource_type.clone(),
            });
        }
        Ok(())
    }
}

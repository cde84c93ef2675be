//! Job and job key repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use alr_core::error::{AppError, ErrorKind};
use alr_core::result::AppResult;
use alr_entity::job::key::ERROR_FILE_SUFFIX;
use alr_entity::job::{Job, JobId, JobKey, JobStatus, NewJobKey};

use crate::store::{JobStore, UpdateOutcome};

const JOB_COLUMNS: &str =
    "id, aco_id, request_url, status, transaction_time, job_count, created_at, updated_at";

/// Repository for export jobs and their job keys.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn get_job_by_id(&self, job_id: JobId) -> AppResult<Option<Job>> {
        let id = job_id.to_db()?;
        sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, format!("Failed to find job {id}"), e)
            })
    }

    async fn get_job_key(&self, job_id: JobId, que_job_id: i64) -> AppResult<Option<JobKey>> {
        let id = job_id.to_db()?;
        sqlx::query_as::<_, JobKey>(
            "SELECT id, job_id, que_job_id, file_name, resource_type FROM job_keys \
             WHERE job_id = $1 AND que_job_id = $2 \
             ORDER BY id LIMIT 1",
        )
        .bind(id)
        .bind(que_job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to find job key for job {id}, que job {que_job_id}"),
                e,
            )
        })
    }

    async fn update_job_status(&self, job_id: JobId, new: JobStatus) -> AppResult<UpdateOutcome> {
        let id = job_id.to_db()?;
        let result = sqlx::query("UPDATE jobs SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(new)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to set job {id} to {new}"),
                    e,
                )
            })?;
        Ok(UpdateOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn update_job_status_check_status(
        &self,
        job_id: JobId,
        current: JobStatus,
        new: JobStatus,
    ) -> AppResult<UpdateOutcome> {
        let id = job_id.to_db()?;
        let result = sqlx::query(
            "UPDATE jobs SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(current)
        .bind(new)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to move job {id} from {current} to {new}"),
                e,
            )
        })?;
        Ok(UpdateOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn finalize_job_status(&self, job_id: JobId, new: JobStatus) -> AppResult<UpdateOutcome> {
        let id = job_id.to_db()?;
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status NOT IN ('Completed', 'Failed', 'Cancelled')",
        )
        .bind(id)
        .bind(new)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to finalize job {id} as {new}"),
                e,
            )
        })?;
        Ok(UpdateOutcome::from_rows_affected(result.rows_affected()))
    }

    async fn get_unique_job_key_count(&self, job_id: JobId) -> AppResult<i64> {
        let id = job_id.to_db()?;
        sqlx::query_scalar("SELECT COUNT(DISTINCT que_job_id) FROM job_keys WHERE job_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to count producing units for job {id}"),
                    e,
                )
            })
    }

    async fn get_job_key_count(&self, job_id: JobId) -> AppResult<i64> {
        let id = job_id.to_db()?;
        sqlx::query_scalar("SELECT COUNT(1) FROM job_keys WHERE job_id = $1 AND file_name NOT LIKE $2")
            .bind(id)
            .bind(format!("%{ERROR_FILE_SUFFIX}%"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to count job keys for job {id}"),
                    e,
                )
            })
    }

    async fn create_job_key(&self, key: &NewJobKey) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO job_keys (job_id, que_job_id, file_name, resource_type) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(key.job_id)
        .bind(key.que_job_id)
        .bind(&key.file_name)
        .bind(&key.resource_type)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to create job key for job {}", key.job_id),
                e,
            )
        })?;
        Ok(())
    }

    async fn create_job_keys(&self, keys: &[NewJobKey]) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO job_keys (job_id, que_job_id, file_name, resource_type) ");
        builder.push_values(keys, |mut row, key| {
            row.push_bind(key.job_id)
                .push_bind(key.que_job_id)
                .push_bind(&key.file_name)
                .push_bind(&key.resource_type);
        });
        // overlapping deliveries of one unit record each artifact once
        builder.push(" ON CONFLICT DO NOTHING");

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job keys", e))?;
        Ok(())
    }
}

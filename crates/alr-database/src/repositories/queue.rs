//! Queue table repository (`que_jobs`).
//!
//! Delivery is at-least-once: a claimed message stays in the table under a
//! lease until the consumer deletes it, and becomes visible again if the
//! consumer dies or records a failure.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use alr_core::error::{AppError, ErrorKind};
use alr_core::result::AppResult;
use alr_entity::queue::QueuedUnit;

/// Repository for queued work units.
#[derive(Debug, Clone)]
pub struct QueueRepository {
    pool: PgPool,
}

impl QueueRepository {
    /// Create a new queue repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a message to the queue.
    pub async fn enqueue(&self, job_class: &str, args: &serde_json::Value) -> AppResult<QueuedUnit> {
        sqlx::query_as::<_, QueuedUnit>(
            "INSERT INTO que_jobs (job_class, args) VALUES ($1, $2) \
             RETURNING id, job_class, args, error_count, run_at, last_error",
        )
        .bind(job_class)
        .bind(args)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue message", e))
    }

    /// Claim the next runnable message of the given classes (SKIP LOCKED for concurrency).
    pub async fn lock_next(
        &self,
        job_classes: &[String],
        lease: Duration,
    ) -> AppResult<Option<QueuedUnit>> {
        sqlx::query_as::<_, QueuedUnit>(
            "UPDATE que_jobs SET locked_until = NOW() + make_interval(secs => $2) \
             WHERE id = ( \
                SELECT id FROM que_jobs \
                WHERE job_class = ANY($1) \
                AND run_at <= NOW() \
                AND (locked_until IS NULL OR locked_until < NOW()) \
                ORDER BY priority ASC, run_at ASC, id ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING id, job_class, args, error_count, run_at, last_error",
        )
        .bind(job_classes)
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock queue message", e))
    }

    /// Push out the lease of a message that is still being handled.
    ///
    /// Returns `false` when the message no longer exists.
    pub async fn extend_lease(&self, id: i64, lease: Duration) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE que_jobs SET locked_until = NOW() + make_interval(secs => $2) WHERE id = $1",
        )
        .bind(id)
        .bind(lease.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to extend lease of que job {id}"),
                e,
            )
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a message that was handled (or abandoned).
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM que_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, format!("Failed to delete que job {id}"), e)
            })?;
        Ok(())
    }

    /// Release a message for redelivery after a failed attempt.
    pub async fn record_failure(
        &self,
        id: i64,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE que_jobs SET error_count = error_count + 1, last_error = $2, \
             run_at = $3, locked_until = NULL WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to record failure of que job {id}"),
                e,
            )
        })?;
        Ok(())
    }
}

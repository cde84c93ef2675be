//! Job entity model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use alr_core::error::AppError;
use alr_core::result::AppResult;

use super::status::JobStatus;

/// A client-requested export spanning many queued units.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: i64,
    /// Owning account.
    pub aco_id: Uuid,
    /// The request that created the job.
    pub request_url: String,
    /// Current job status.
    pub status: JobStatus,
    /// Point in time the export data reflects.
    pub transaction_time: Option<DateTime<Utc>>,
    /// Number of queued units the job was split into. Fixed at creation.
    pub job_count: i32,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Job identifier as carried in queue payloads.
///
/// Upstream serializes it unsigned; the store keys jobs by `BIGINT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Convert to the signed store representation.
    pub fn to_db(self) -> AppResult<i64> {
        i64::try_from(self.0).map_err(|_| {
            AppError::validation(format!("Job id {} does not fit in a signed 64-bit integer", self.0))
        })
    }

    /// Return the raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl TryFrom<i64> for JobId {
    type Error = AppError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        u64::try_from(id)
            .map(Self)
            .map_err(|_| AppError::validation(format!("Job id {id} is negative")))
    }
}

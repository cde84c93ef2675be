//! Job key entity: one row per artifact a unit produced.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Suffix of artifacts that carry per-row errors rather than report data.
pub const ERROR_FILE_SUFFIX: &str = "-error.ndjson";

/// A produced artifact, attributed to the queue unit that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobKey {
    /// Row identifier.
    pub id: i64,
    /// Owning job.
    pub job_id: i64,
    /// Queue message that produced the artifact.
    pub que_job_id: Option<i64>,
    /// Artifact file name inside the job's directory.
    pub file_name: String,
    /// Resource type tag.
    pub resource_type: String,
}

impl JobKey {
    /// Whether this key points at an error artifact.
    pub fn is_error_file(&self) -> bool {
        self.file_name.contains(ERROR_FILE_SUFFIX)
    }
}

/// Data required to record a new job key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJobKey {
    /// Owning job.
    pub job_id: i64,
    /// Queue message that produced the artifact.
    pub que_job_id: Option<i64>,
    /// Artifact file name.
    pub file_name: String,
    /// Resource type tag.
    pub resource_type: String,
}

//! Job status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an export job.
///
/// Stored as the Postgres enum `job_status`; the labels match what the
/// request-intake service writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status")]
pub enum JobStatus {
    /// Created, no unit has started yet.
    #[sqlx(rename = "Pending")]
    #[serde(rename = "Pending")]
    Pending,
    /// At least one unit has started.
    #[sqlx(rename = "In Progress")]
    #[serde(rename = "In Progress")]
    InProgress,
    /// Every unit finished and the payload was published.
    #[sqlx(rename = "Completed")]
    #[serde(rename = "Completed")]
    Completed,
    /// A unit exhausted its retry budget.
    #[sqlx(rename = "Failed")]
    #[serde(rename = "Failed")]
    Failed,
    /// Cancelled by the requester.
    #[sqlx(rename = "Cancelled")]
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Return the status label as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serde_uses_stored_labels() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let parsed: JobStatus = serde_json::from_str("\"Cancelled\"").unwrap();
        assert_eq!(parsed, JobStatus::Cancelled);
    }
}

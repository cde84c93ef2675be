//! Queued work unit (queue envelope).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use alr_core::error::{AppError, ErrorKind};
use alr_core::result::AppResult;

/// One delivered queue message.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueuedUnit {
    /// Queue-assigned identifier.
    pub id: i64,
    /// Handler class the message is routed to (e.g. `"AlrJob"`).
    pub job_class: String,
    /// Serialized handler arguments.
    pub args: serde_json::Value,
    /// Number of earlier deliveries that failed.
    pub error_count: i32,
    /// Earliest time the message may be delivered.
    pub run_at: DateTime<Utc>,
    /// Error returned by the last failed delivery.
    pub last_error: Option<String>,
}

impl QueuedUnit {
    /// Decode the message arguments into a typed payload.
    pub fn decode_args<T: DeserializeOwned>(&self) -> AppResult<T> {
        T::deserialize(&self.args).map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Failed to decode args of queue job {}", self.id),
                e,
            )
        })
    }
}

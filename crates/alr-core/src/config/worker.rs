//! Queue worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent work-unit tasks.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval in seconds between queue polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Prior delivery failures tolerated before a unit's parent job is failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Interval in seconds between cancellation checks of a running job.
    #[serde(default = "default_cancellation_poll")]
    pub cancellation_poll_seconds: u64,
    /// How long a claimed queue message stays invisible to other workers.
    #[serde(default = "default_lease")]
    pub lease_seconds: u64,
}

impl WorkerConfig {
    /// Cancellation poll interval as a [`Duration`].
    pub fn cancellation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.cancellation_poll_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_seconds: default_poll_interval(),
            max_retries: default_max_retries(),
            cancellation_poll_seconds: default_cancellation_poll(),
            lease_seconds: default_lease(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_retries() -> i32 {
    3
}

fn default_cancellation_poll() -> u64 {
    15
}

fn default_lease() -> u64 {
    3600
}

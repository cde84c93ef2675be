//! Output directory configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where work units write their artifacts and where finished jobs land.
///
/// Both directories hold one subdirectory per job identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving artifacts while a job is still in progress.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Directory a completed job is relocated into.
    #[serde(default = "default_payload_dir")]
    pub payload_dir: String,
}

impl ExportConfig {
    /// Staging subdirectory for a job.
    pub fn staging_path(&self, job_id: u64) -> PathBuf {
        PathBuf::from(&self.staging_dir).join(job_id.to_string())
    }

    /// Payload subdirectory for a job.
    pub fn payload_path(&self, job_id: u64) -> PathBuf {
        PathBuf::from(&self.payload_dir).join(job_id.to_string())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            payload_dir: default_payload_dir(),
        }
    }
}

fn default_staging_dir() -> String {
    "data/staging".to_string()
}

fn default_payload_dir() -> String {
    "data/payload".to_string()
}

//! Work-unit processor: produces one slice of a job's output.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing;

use alr_core::error::{AppError, ErrorKind};
use alr_core::result::AppResult;
use alr_database::JobStore;
use alr_entity::job::{JobAlrEnqueueArgs, NewJobKey};

/// Resource type recorded on ALR job keys.
pub const ALR_RESOURCE_TYPE: &str = "ALR";

/// Produces the artifacts for one queued unit.
///
/// Implementations write into the job's staging directory and record a
/// job key per finished artifact, attributed to `que_job_id`. They should
/// return promptly with an error once `cancel` is tripped.
#[async_trait]
pub trait AlrProcessor: Send + Sync + std::fmt::Debug {
    /// Process one unit.
    async fn process_alr_job(
        &self,
        cancel: CancellationToken,
        que_job_id: i64,
        args: &JobAlrEnqueueArgs,
    ) -> AppResult<()>;
}

/// Writes the unit's beneficiary roster as NDJSON.
///
/// The artifact is named after the queue message, so a redelivered unit
/// overwrites its own partial output instead of adding a second file. The
/// job key is inserted only after the file is flushed.
#[derive(Debug)]
pub struct RosterExporter {
    store: Arc<dyn JobStore>,
    staging_dir: PathBuf,
}

impl RosterExporter {
    /// Create an exporter writing under `staging_dir`.
    pub fn new(store: Arc<dyn JobStore>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            staging_dir: staging_dir.into(),
        }
    }

    fn cancelled(job_id: i64, que_job_id: i64) -> AppError {
        AppError::cancelled(format!("Unit {que_job_id} of job {job_id} was cancelled"))
    }
}

#[async_trait]
impl AlrProcessor for RosterExporter {
    async fn process_alr_job(
        &self,
        cancel: CancellationToken,
        que_job_id: i64,
        args: &JobAlrEnqueueArgs,
    ) -> AppResult<()> {
        let job_id = args.job_id().to_db()?;
        if cancel.is_cancelled() {
            return Err(Self::cancelled(job_id, que_job_id));
        }

        let dir = self.staging_dir.join(job_id.to_string());
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create staging directory: {}", dir.display()),
                e,
            )
        })?;

        let file_name = format!("{que_job_id}.ndjson");
        let path = dir.join(&file_name);
        let file = fs::File::create(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create artifact: {}", path.display()),
                e,
            )
        })?;
        let mut writer = BufWriter::new(file);

        for mbi in &args.mbis {
            if cancel.is_cancelled() {
                return Err(Self::cancelled(job_id, que_job_id));
            }
            let line = serde_json::json!({
                "aco": args.cms_id,
                "mbi": mbi,
                "lowerBound": args.lower_bound,
                "upperBound": args.upper_bound,
            });
            writer.write_all(line.to_string().as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;

        self.store
            .create_job_key(&NewJobKey {
                job_id,
                que_job_id: Some(que_job_id),
                file_name: file_name.clone(),
                resource_type: ALR_RESOURCE_TYPE.to_string(),
            })
            .await?;

        tracing::debug!(
            job_id,
            que_job_id,
            file_name = %file_name,
            rows = args.mbis.len(),
            "Wrote ALR artifact"
        );
        Ok(())
    }
}

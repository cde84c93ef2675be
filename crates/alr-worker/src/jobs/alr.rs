//! ALR export unit handler.
//!
//! Many units of one job run concurrently on different workers, and each
//! may be delivered more than once. They coordinate only through the job
//! row (guarded status updates) and the job keys each unit records.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing;

use alr_core::config::{ExportConfig, WorkerConfig};
use alr_core::error::{AppError, ErrorKind};
use alr_core::result::AppResult;
use alr_database::{JobStore, UpdateOutcome};
use alr_entity::job::{JobAlrEnqueueArgs, JobId, JobStatus};
use alr_entity::queue::QueuedUnit;

use crate::cancellation::CancellationWatcher;
use crate::completion::CompletionDetector;
use crate::executor::QueueHandler;
use crate::processor::AlrProcessor;

/// Queue job class consumed by [`AlrJobHandler`].
pub const ALR_JOB_CLASS: &str = "AlrJob";

/// Drives one ALR unit and, when it is the last one, finalizes the job.
#[derive(Debug)]
pub struct AlrJobHandler {
    store: Arc<dyn JobStore>,
    processor: Arc<dyn AlrProcessor>,
    detector: CompletionDetector,
    /// Prior delivery failures tolerated before the job is given up on
    max_retries: i32,
    cancellation_poll: Duration,
    export: ExportConfig,
}

impl AlrJobHandler {
    /// Create a new handler.
    pub fn new(
        store: Arc<dyn JobStore>,
        processor: Arc<dyn AlrProcessor>,
        worker: &WorkerConfig,
        export: &ExportConfig,
    ) -> Self {
        Self {
            detector: CompletionDetector::new(Arc::clone(&store)),
            store,
            processor,
            max_retries: worker.max_retries,
            cancellation_poll: worker.cancellation_poll_interval(),
            export: export.clone(),
        }
    }

    /// Handle one delivery of an ALR unit.
    pub async fn start_alr_job(&self, unit: &QueuedUnit) -> AppResult<()> {
        let args: JobAlrEnqueueArgs = match unit.decode_args() {
            Ok(args) => args,
            Err(e) if unit.error_count >= self.max_retries => {
                tracing::error!(
                    que_job_id = unit.id,
                    args = %unit.args,
                    error = %e,
                    "Undecodable ALR args and retries exhausted, removing from queue"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    que_job_id = unit.id,
                    args = %unit.args,
                    error = %e,
                    "Failed to decode ALR args, will retry"
                );
                return Err(e);
            }
        };
        let job_id = args.job_id();

        // every store call needs the signed id; no redelivery can fix this
        let db_job_id = match job_id.to_db() {
            Ok(id) => id,
            Err(e) if unit.error_count >= self.max_retries => {
                tracing::error!(
                    %job_id,
                    que_job_id = unit.id,
                    error = %e,
                    "Job id out of range and retries exhausted, removing from queue"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::error!(%job_id, que_job_id = unit.id, error = %e, "Failed to convert job id");
                return Err(e);
            }
        };

        let job = match self.store.get_job_by_id(job_id).await? {
            Some(job) => job,
            None if unit.error_count >= self.max_retries => {
                tracing::error!(
                    %job_id,
                    aco = %args.cms_id,
                    que_job_id = unit.id,
                    "No job found and retries exhausted, removing from queue"
                );
                return Ok(());
            }
            None => {
                tracing::warn!(%job_id, aco = %args.cms_id, "No job found, will retry");
                return Err(AppError::not_found(format!(
                    "Could not retrieve job {job_id} from database"
                )));
            }
        };

        if matches!(job.status, JobStatus::Cancelled | JobStatus::Failed) {
            tracing::warn!(
                %job_id,
                que_job_id = unit.id,
                status = %job.status,
                "ALR job already ended, not processing unit"
            );
            return Ok(());
        }

        if self.store.get_job_key(job_id, unit.id).await?.is_some() {
            tracing::warn!(
                %job_id,
                que_job_id = unit.id,
                "ALR unit was already processed, not processing again"
            );
            return Ok(());
        }

        // dropped on every return path below, which cancels the token
        let watcher = CancellationWatcher::spawn(
            Arc::clone(&self.store),
            db_job_id,
            self.cancellation_poll,
            CancellationToken::new(),
        );

        if unit.error_count > self.max_retries {
            match self.store.finalize_job_status(job_id, JobStatus::Failed).await {
                Ok(UpdateOutcome::Applied) => {}
                Ok(UpdateOutcome::NotApplied) => {
                    tracing::warn!(%job_id, "Job already ended, not marking it failed");
                }
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "Could not mark job as failed");
                }
            }
            tracing::warn!(
                %job_id,
                que_job_id = unit.id,
                error_count = unit.error_count,
                "ALR unit exceeded its retry budget, job failed"
            );
            return Ok(());
        }

        match self
            .store
            .update_job_status_check_status(job_id, JobStatus::Pending, JobStatus::InProgress)
            .await
        {
            Ok(UpdateOutcome::Applied) => {
                tracing::info!(%job_id, "Job moved to in progress");
            }
            Ok(UpdateOutcome::NotApplied) => {
                tracing::debug!(%job_id, "Job no longer pending, continuing");
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Failed to update job status");
                return Err(e);
            }
        }

        if let Err(e) = self
            .processor
            .process_alr_job(watcher.token().clone(), unit.id, &args)
            .await
        {
            tracing::warn!(%job_id, que_job_id = unit.id, error = %e, "Failed to complete ALR unit");
            return Err(e);
        }

        let complete = self.detector.is_complete(job_id).await.map_err(|e| {
            tracing::warn!(%job_id, error = %e, "Failed to check job completion");
            e
        })?;

        if complete {
            self.relocate_output(job_id).await?;

            match self
                .store
                .finalize_job_status(job_id, JobStatus::Completed)
                .await
            {
                Ok(UpdateOutcome::Applied) => {
                    tracing::info!(%job_id, "ALR job completed");
                }
                Ok(UpdateOutcome::NotApplied) => {
                    tracing::debug!(%job_id, "Job already ended, completion not recorded");
                }
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "Failed to mark job completed");
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Move `staging/<id>` to `payload/<id>`.
    ///
    /// A missing staging directory next to an existing payload directory
    /// means a concurrent unit already moved it.
    async fn relocate_output(&self, job_id: JobId) -> AppResult<()> {
        let from = self.export.staging_path(job_id.get());
        let to = self.export.payload_path(job_id.get());

        fs::create_dir_all(&self.export.payload_dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create payload directory: {}", self.export.payload_dir),
                e,
            )
        })?;

        match fs::rename(&from, &to).await {
            Ok(()) => {
                tracing::info!(%job_id, payload = %to.display(), "Moved job output to payload directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && fs::try_exists(&to).await.unwrap_or(false) => {
                tracing::debug!(%job_id, "Job output already in payload directory");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Failed to move data to payload directory");
                Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!(
                        "Failed to move {} to {}",
                        from.display(),
                        to.display()
                    ),
                    e,
                ))
            }
        }
    }
}

#[async_trait]
impl QueueHandler for AlrJobHandler {
    fn job_class(&self) -> &str {
        ALR_JOB_CLASS
    }

    async fn handle(&self, unit: &QueuedUnit) -> AppResult<()> {
        self.start_alr_job(unit).await
    }
}

//! Background watcher that trips a unit's cancellation token when its job
//! is cancelled.
//!
//! The watcher is advisory: it never fails the unit. The work-unit
//! processor has to observe the token to actually stop early.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing;

use alr_database::JobStore;
use alr_entity::job::{JobId, JobStatus};

/// Spawns cancellation watchers.
#[derive(Debug)]
pub struct CancellationWatcher;

impl CancellationWatcher {
    /// Start polling the job's status every `interval`.
    ///
    /// The task ends when the job turns up `Cancelled` (after cancelling
    /// `token`) or when `token` is cancelled by anyone else. Dropping the
    /// returned guard cancels the token.
    pub fn spawn(
        store: Arc<dyn JobStore>,
        job_id: i64,
        interval: Duration,
        token: CancellationToken,
    ) -> WatcherGuard {
        let handle = match JobId::try_from(job_id) {
            Ok(id) => Some(tokio::spawn(watch(store, id, interval, token.clone()))),
            Err(e) => {
                tracing::error!(job_id, error = %e, "Not watching job for cancellation");
                None
            }
        };

        WatcherGuard { token, handle }
    }
}

/// Owns a running watcher; cancels its token when dropped.
#[derive(Debug)]
pub struct WatcherGuard {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WatcherGuard {
    /// The token the watcher trips.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the token and wait for the watcher task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Cancellation watcher ended abnormally");
            }
        }
    }
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn watch(store: Arc<dyn JobStore>, job_id: JobId, interval: Duration, token: CancellationToken) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick fires immediately; the first check is one interval out
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::trace!(%job_id, "Cancellation watcher stopped");
                return;
            }
            _ = ticker.tick() => {
                match store.get_job_by_id(job_id).await {
                    Ok(Some(job)) if job.status == JobStatus::Cancelled => {
                        tracing::info!(%job_id, "Job was cancelled, signalling running unit to stop");
                        token.cancel();
                        return;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::debug!(%job_id, "Job not found while checking for cancellation");
                    }
                    Err(e) => {
                        tracing::warn!(%job_id, error = %e, "Failed to check job for cancellation");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alr_database::MemoryJobStore;

    const INTERVAL: Duration = Duration::from_secs(15);

    #[tokio::test(start_paused = true)]
    async fn test_cancels_token_when_job_cancelled() {
        let store = MemoryJobStore::new();
        store.insert_job(5, 3, JobStatus::InProgress).await;

        let token = CancellationToken::new();
        let guard = CancellationWatcher::spawn(Arc::new(store.clone()), 5, INTERVAL, token.clone());

        time::sleep(Duration::from_secs(40)).await;
        assert!(!token.is_cancelled());

        store.update_job_status(JobId(5), JobStatus::Cancelled).await.unwrap();
        let tripped = time::timeout(Duration::from_secs(60), token.cancelled()).await;
        assert!(tripped.is_ok());

        guard.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task_without_touching_store() {
        let store = MemoryJobStore::new();
        store.insert_job(6, 1, JobStatus::InProgress).await;

        let token = CancellationToken::new();
        let guard = CancellationWatcher::spawn(Arc::new(store.clone()), 6, INTERVAL, token.clone());
        guard.stop().await;

        assert!(token.is_cancelled());
        assert_eq!(store.job(6).await.unwrap().status, JobStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_are_swallowed() {
        let store = MemoryJobStore::new();
        store.insert_job(8, 1, JobStatus::InProgress).await;
        store.set_unavailable(true).await;

        let token = CancellationToken::new();
        let _guard = CancellationWatcher::spawn(Arc::new(store.clone()), 8, INTERVAL, token.clone());

        time::sleep(Duration::from_secs(100)).await;
        assert!(!token.is_cancelled());

        store.set_unavailable(false).await;
        store.update_job_status(JobId(8), JobStatus::Cancelled).await.unwrap();
        let tripped = time::timeout(Duration::from_secs(60), token.cancelled()).await;
        assert!(tripped.is_ok());
    }

    #[tokio::test]
    async fn test_dropping_guard_cancels_token() {
        let store = MemoryJobStore::new();
        let token = CancellationToken::new();
        {
            let _guard =
                CancellationWatcher::spawn(Arc::new(store), 9, INTERVAL, token.clone());
        }
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_negative_id_is_not_watched() {
        let token = CancellationToken::new();
        let guard = CancellationWatcher::spawn(
            Arc::new(MemoryJobStore::new()),
            -1,
            INTERVAL,
            token.clone(),
        );
        assert!(guard.handle.is_none());
        assert!(!guard.token().is_cancelled());
    }
}

//! Worker runner: main loop that polls the queue and handles messages.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::time::{self, MissedTickBehavior};
use tracing;

use alr_core::config::WorkerConfig;
use alr_core::result::AppResult;

use crate::executor::QueueDispatcher;
use crate::queue::JobQueue;

/// How long shutdown waits for in-flight units.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Main worker runner that polls the queue and dispatches messages
#[derive(Debug)]
pub struct WorkerRunner {
    /// Job queue for polling
    queue: Arc<JobQueue>,
    /// Dispatcher routing messages to handlers
    dispatcher: Arc<QueueDispatcher>,
    /// Worker configuration
    config: WorkerConfig,
    /// Worker identifier
    worker_id: String,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        queue: Arc<JobQueue>,
        dispatcher: Arc<QueueDispatcher>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            config,
            worker_id,
        }
    }

    /// Run until the shutdown signal is received
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let job_classes = self.dispatcher.job_classes();
        tracing::info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            poll_interval_seconds = self.config.poll_interval_seconds,
            job_classes = ?job_classes,
            "Worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "Received shutdown signal");
                        break;
                    }
                }
                claimed = self.poll_and_handle(&semaphore, &job_classes) => {
                    // drain without sleeping while messages keep coming
                    if claimed {
                        continue;
                    }
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                tracing::info!(worker_id = %self.worker_id, "Shutting down");
                                break;
                            }
                        }
                        _ = time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Waiting for in-flight units to finish...");

        let abandoned = wait_for_in_flight(&semaphore, self.config.concurrency, SHUTDOWN_GRACE).await;
        if abandoned > 0 {
            tracing::warn!(
                worker_id = %self.worker_id,
                abandoned,
                grace_seconds = SHUTDOWN_GRACE.as_secs(),
                "Shutdown grace elapsed, abandoning in-flight units to lease expiry"
            );
        }

        tracing::info!(worker_id = %self.worker_id, "Worker shut down complete");
    }

    /// Claim one message and handle it on its own task. Returns whether a
    /// message was claimed.
    async fn poll_and_handle(&self, semaphore: &Arc<Semaphore>, job_classes: &[String]) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied, waiting...");
                return false;
            }
        };

        match self.queue.dequeue(job_classes).await {
            Ok(Some(unit)) => {
                let queue = Arc::clone(&self.queue);
                let dispatcher = Arc::clone(&self.dispatcher);

                tokio::spawn(async move {
                    let _permit = permit;

                    let renew_every = queue.renew_interval();
                    let result = hold_lease(dispatcher.dispatch(&unit), renew_every, || {
                        let queue = Arc::clone(&queue);
                        let que_job_id = unit.id;
                        async move { queue.extend_lease(que_job_id).await }
                    })
                    .await;

                    match result {
                        Ok(()) => {
                            if let Err(e) = queue.complete(unit.id).await {
                                // the lease expires and the unit is redelivered
                                tracing::error!(que_job_id = unit.id, error = %e, "Failed to remove message");
                            }
                        }
                        Err(e) => {
                            if e.is_transient() {
                                tracing::warn!(
                                    que_job_id = unit.id,
                                    error_count = unit.error_count,
                                    error = %e,
                                    "Message handling failed, scheduling redelivery"
                                );
                            } else {
                                tracing::error!(
                                    que_job_id = unit.id,
                                    error_count = unit.error_count,
                                    error = %e,
                                    "Message handling failed with a non-transient error, scheduling redelivery"
                                );
                            }
                            if let Err(e) = queue.fail(&unit, &e.to_string()).await {
                                tracing::error!(que_job_id = unit.id, error = %e, "Failed to record message failure");
                            }
                        }
                    }
                });
                true
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No messages available");
                false
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to dequeue message");
                false
            }
        }
    }
}

/// Wait up to `grace` for all `slots` permits to come back. Returns how many
/// units were still running when the grace ran out.
async fn wait_for_in_flight(semaphore: &Semaphore, slots: usize, grace: Duration) -> usize {
    let permits = u32::try_from(slots).unwrap_or(u32::MAX);
    match time::timeout(grace, semaphore.acquire_many(permits)).await {
        Ok(_) => 0,
        Err(_) => slots.saturating_sub(semaphore.available_permits()),
    }
}

/// Drive `work` to completion, calling `renew` every `every` while it runs.
///
/// Renewal failures are logged only; if the lease does lapse the unit may be
/// delivered again, which the handler's job key check tolerates.
async fn hold_lease<W, R, F>(work: W, every: Duration, mut renew: R) -> W::Output
where
    W: Future,
    R: FnMut() -> F,
    F: Future<Output = AppResult<()>>,
{
    tokio::pin!(work);
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // claiming the message already set a full lease
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            output = &mut work => return output,
            _ = ticker.tick() => {
                if let Err(e) = renew().await {
                    tracing::warn!(error = %e, "Failed to renew message lease");
                }
            }
        }
    }
}

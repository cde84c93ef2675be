//! Queue dispatcher routing delivered messages to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing;

use alr_core::error::AppError;
use alr_core::result::AppResult;
use alr_entity::queue::QueuedUnit;

/// Trait for queue message handlers.
///
/// `Ok(())` tells the queue to discard the message (handled, or
/// deliberately abandoned). `Err` asks for redelivery.
#[async_trait]
pub trait QueueHandler: Send + Sync + std::fmt::Debug {
    /// The job class this handler consumes.
    fn job_class(&self) -> &str;

    /// Handle one delivery.
    async fn handle(&self, unit: &QueuedUnit) -> AppResult<()>;
}

/// Dispatches messages to the appropriate handler based on `job_class`.
#[derive(Debug, Default)]
pub struct QueueDispatcher {
    handlers: HashMap<String, Arc<dyn QueueHandler>>,
}

impl QueueDispatcher {
    /// Create a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn register(&mut self, handler: Arc<dyn QueueHandler>) {
        let job_class = handler.job_class().to_string();
        tracing::info!("Registered queue handler for class '{}'", job_class);
        self.handlers.insert(job_class, handler);
    }

    /// Dispatch a delivery to its handler.
    ///
    /// Unknown classes are returned as errors so the message stays queued
    /// until a worker that knows the class picks it up.
    pub async fn dispatch(&self, unit: &QueuedUnit) -> AppResult<()> {
        let handler = self.handlers.get(&unit.job_class).ok_or_else(|| {
            AppError::internal(format!(
                "No handler registered for job class '{}'",
                unit.job_class
            ))
        })?;

        tracing::debug!(
            que_job_id = unit.id,
            job_class = %unit.job_class,
            error_count = unit.error_count,
            "Dispatching queue message"
        );

        handler.handle(unit).await
    }

    /// Job classes this dispatcher consumes.
    pub fn job_classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.handlers.keys().cloned().collect();
        classes.sort();
        classes
    }
}

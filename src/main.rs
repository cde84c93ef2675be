//! ALR exporter: queue worker for Assignment List Report export jobs.
//!
//! Wires configuration, logging, the job store, and the queue worker
//! together and runs until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use alr_core::config::{AppConfig, LogFormat};
use alr_core::error::AppError;
use alr_database::{DatabasePool, JobStore};
use alr_worker::{AlrJobHandler, JobQueue, QueueDispatcher, RosterExporter, WorkerRunner};

#[tokio::main]
async fn main() {
    let env = std::env::var("ALR_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Worker error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main worker run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting ALR exporter v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Output directories ───────────────────────────────
    for dir in [&config.export.staging_dir, &config.export.payload_dir] {
        tokio::fs::create_dir_all(dir).await?;
    }

    // ── Step 2: Database connection + migrations ─────────────────
    let db = DatabasePool::connect(&config.database).await?;
    db.migrate().await?;

    // ── Step 3: Handler wiring ───────────────────────────────────
    let store: Arc<dyn JobStore> = Arc::new(db.job_repository());
    let processor = Arc::new(RosterExporter::new(
        Arc::clone(&store),
        &config.export.staging_dir,
    ));
    let handler = Arc::new(AlrJobHandler::new(
        store,
        processor,
        &config.worker,
        &config.export,
    ));

    let mut dispatcher = QueueDispatcher::new();
    dispatcher.register(handler);

    let queue = Arc::new(JobQueue::new(
        db.queue_repository(),
        Duration::from_secs(config.worker.lease_seconds),
    ));

    // ── Step 4: Worker loop until Ctrl-C ─────────────────────────
    let worker_id = format!("alr-exporter-{}", std::process::id());
    let runner = WorkerRunner::new(queue, Arc::new(dispatcher), config.worker.clone(), worker_id);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // keep the sender alive so the worker is not torn down
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                shutdown_tx.closed().await;
            }
        }
    });

    runner.run(shutdown_rx).await;

    db.close().await;
    Ok(())
}

//! Configuration for the exporter.
//!
//! Layers, later wins: `config/default.toml`, `config/{env}.toml`, then
//! `ALR_<SECTION>__<KEY>` environment variables.

pub mod database;
pub mod export;
pub mod logging;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::export::ExportConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;
use crate::result::AppResult;

/// Merged configuration. Only `database.url` has no default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate the configuration for `env`, e.g.
    /// `ALR_WORKER__MAX_RETRIES=5` overrides `worker.max_retries`.
    pub fn load(env: &str) -> AppResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ALR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.database.url.is_empty() {
            return Err(AppError::configuration("database.url must be set"));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be at least 1"));
        }
        // interval timers panic on a zero period
        if self.worker.poll_interval_seconds == 0 || self.worker.cancellation_poll_seconds == 0 {
            return Err(AppError::configuration(
                "worker poll intervals must be at least one second",
            ));
        }
        if self.worker.lease_seconds == 0 {
            return Err(AppError::configuration("worker.lease_seconds must be at least 1"));
        }
        if self.worker.max_retries < 0 {
            return Err(AppError::configuration("worker.max_retries must not be negative"));
        }
        Ok(())
    }
}

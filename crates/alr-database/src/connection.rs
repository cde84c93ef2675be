//! PostgreSQL connection pool and schema setup.

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use alr_core::config::DatabaseConfig;
use alr_core::error::{AppError, ErrorKind};

use crate::repositories::{JobRepository, QueueRepository};

/// Wrapper around the sqlx PostgreSQL connection pool.
///
/// The job store and the queue share one pool; handler invocations and
/// the poller draw from it concurrently.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect using the configured URL and pool limits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to database: {e}"),
                    e,
                )
            })?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Apply pending migrations for `jobs`, `job_keys`, and `que_jobs`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to run migrations: {e}"),
                    e,
                )
            })?;

        info!("Database schema is up to date");
        Ok(())
    }

    /// Job and job key repository over this pool.
    pub fn job_repository(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }

    /// Queue repository over this pool.
    pub fn queue_repository(&self) -> QueueRepository {
        QueueRepository::new(self.pool.clone())
    }

    /// Return a reference to the underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Mask the password portion of a database URL for safe logging.
fn mask_password(url: &str) -> String {
    let Some(at_pos) = url.find('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url[..at_pos].rfind(':') {
        Some(colon_pos) if colon_pos > scheme_end => {
            format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://alr:secret@db:5432/export"),
            "postgres://alr:****@db:5432/export"
        );
        assert_eq!(
            mask_password("postgres://localhost:5432/export"),
            "postgres://localhost:5432/export"
        );
        assert_eq!(
            mask_password("postgres://alr@localhost/export"),
            "postgres://alr@localhost/export"
        );
    }
}

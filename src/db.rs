use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sqlx::migrate::MigrateDatabase;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    FromRow, Postgres,
};
use thiserror::Error;

use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Failed to create database: {0}")]
    DatabaseCreationFailed(String),
}

pub type DbResult<T> = Result<T, DatabaseError>;

/// Represents an established database connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Health of a backing store
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Where the key counter stands, as seen by the health probe
#[derive(Debug, Clone, FromRow, Deserialize, Serialize)]
pub struct KeyStoreInfo {
    pub database: Option<String>,
    /// Last seed handed out by `short_key_seed_seq`, `None` before the first reservation
    pub last_seed: Option<i64>,
}

/// Complete database health check result
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseHealth {
    pub status: HealthState,
    pub response_time_ms: u64,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_store: Option<KeyStoreInfo>,
}

impl Database {
    /// Create a new database connection pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Initializing database connection");
        debug!(
            "Database configuration: max_conn={}, min_conn={}, timeout={}s",
            config.max_connections, config.min_connections, config.connect_timeout_seconds
        );

        if !config.skip_db_exists_check {
            Self::ensure_database_exists(config).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                DatabaseError::ConnectionError(e)
            })?;

        info!("Successfully connected to database");

        if config.use_migrations {
            Self::run_migrations(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Probes the pool and reads the key counter, giving up after `limit`
    pub async fn health_check(&self, limit: Duration) -> DatabaseHealth {
        let (probe, response_time_ms) = timed_probe(
            limit,
            sqlx::query_as::<_, KeyStoreInfo>(
                "SELECT current_database() AS database, \
                 CASE WHEN is_called THEN last_value END AS last_seed \
                 FROM short_key_seed_seq",
            )
            .fetch_one(self.get_pool()),
        )
        .await;

        match probe {
            Ok(info) => DatabaseHealth {
                status: HealthState::Healthy,
                response_time_ms,
                message: None,
                key_store: Some(info),
            },
            Err(e) => {
                warn!("Key store health probe failed: {}", e);
                DatabaseHealth {
                    status: HealthState::Unhealthy,
                    response_time_ms,
                    message: Some(format!("Key store probe failed: {}", e)),
                    key_store: None,
                }
            }
        }
    }

    /// Ensure the target database exists, create it if necessary
    async fn ensure_database_exists(config: &DatabaseConfig) -> DbResult<()> {
        let url = &config.url;
        let db_name = extract_db_name_from_url(url).ok_or_else(|| {
            DatabaseError::DatabaseNotFound(
                "Could not extract database name from connection string".to_string(),
            )
        })?;

        debug!("Checking if database '{}' exists", db_name);

        let db_exists = Postgres::database_exists(url)
            .await
            .map_err(DatabaseError::ConnectionError)?;

        if db_exists {
            debug!("Database '{}' exists", db_name);
            return Ok(());
        }

        if !config.create_database_if_missing {
            return Err(DatabaseError::DatabaseNotFound(format!(
                "Database '{}' does not exist",
                db_name
            )));
        }

        info!("Database '{}' does not exist, creating it", db_name);

        if let Err(err) = Postgres::create_database(url).await {
            return Err(DatabaseError::DatabaseCreationFailed(format!(
                "Failed to create database '{}': {}",
                db_name, err
            )));
        }

        info!("Successfully created database '{}'", db_name);
        Ok(())
    }

    /// Run database migrations
    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        info!("Running database migrations");

        match sqlx::migrate!("./migrations").run(pool).await {
            Ok(_) => {
                info!("Database migrations completed successfully");
                Ok(())
            }
            Err(e) => {
                warn!("Database migration error: {}", e);
                Err(DatabaseError::MigrationError(e.to_string()))
            }
        }
    }

    /// Gracefully close the database connection pool
    pub async fn shutdown(&self) {
        info!("Shutting down database connection pool...");

        let used_connections = self.pool.size();
        let idle_connections = self.pool.num_idle();

        self.pool.close().await;

        info!(
            "Database connection pool closed. Stats: {} active, {} idle connections released",
            used_connections, idle_connections
        );
    }
}

/// Runs a health probe bounded by `limit`, returning its outcome and latency in ms.
/// A probe that runs out of time reports as failed.
pub async fn timed_probe<T, E, F>(limit: Duration, probe: F) -> (Result<T, String>, u64)
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let outcome = match tokio::time::timeout(limit, probe).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
    };
    (outcome, start.elapsed().as_millis() as u64)
}

/// Extract database name from a PostgreSQL connection string
fn extract_db_name_from_url(url: &str) -> Option<String> {
    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 4 {
        return None;
    }

    // The database name is the fourth part, potentially with query params
    let db_name = parts[3].split('?').next()?;

    if db_name.is_empty() {
        return None;
    }

    Some(db_name.to_string())
}

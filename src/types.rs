use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::db::{Database, DatabaseHealth};
use crate::errors::AppError;
use crate::queue_store::{QueueStore, RedisHealth};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize, Deserialize)]
pub struct ResponsePayload {
    pub status: i32,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db_health: Option<DatabaseHealth>,
    pub redis_health: Option<RedisHealth>,
    pub uptime_seconds: u64,
}

// Shared state for the health endpoints
pub struct AppState {
    pub start_time: Instant,
    pub db: Database,
    pub queue_store: QueueStore,
    /// Upper bound for each store probe
    pub probe_timeout: Duration,
    pub version: String,
}

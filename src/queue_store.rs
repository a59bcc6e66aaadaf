use std::time::Duration;

use log::{debug, info, warn};
use redis::{aio::ConnectionManager, Client};
use serde::{Deserialize, Serialize};

use crate::config::RedisConfig;
use crate::db::{timed_probe, HealthState};
use crate::errors::QueueError;

/// Shared Redis connection backing the key queue.
///
/// `ConnectionManager` multiplexes commands and reconnects on its own, so
/// clones are cheap handles to the same connection.
#[derive(Clone)]
pub struct QueueStore {
    manager: ConnectionManager,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisHealth {
    pub status: HealthState,
    pub response_time_ms: u64,
    pub message: Option<String>,
}

impl QueueStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self, QueueError> {
        info!("Initializing redis connection");

        let client = Client::open(config.url.as_str())
            .map_err(|e| QueueError::Connection(format!("Invalid redis url: {}", e)))?;

        let mut manager = ConnectionManager::new(client).await.map_err(|e| {
            warn!("Failed to connect to redis: {}", e);
            QueueError::Connection(e.to_string())
        })?;

        let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
        debug!("Redis answered {}", pong);

        info!("Successfully connected to redis");
        Ok(Self { manager })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// PINGs redis, giving up after `limit`
    pub async fn health_check(&self, limit: Duration) -> RedisHealth {
        let mut conn = self.connection();

        let (result, elapsed) = timed_probe(limit, async {
            let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            pong
        })
        .await;

        match result {
            Ok(_) => RedisHealth {
                status: HealthState::Healthy,
                response_time_ms: elapsed,
                message: None,
            },
            Err(e) => RedisHealth {
                status: HealthState::Unhealthy,
                response_time_ms: elapsed,
                message: Some(format!("Redis ping failed: {}", e)),
            },
        }
    }
}

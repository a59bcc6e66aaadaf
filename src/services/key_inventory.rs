// src/services/key_inventory.rs - Read-only views over the key stores
use std::sync::Arc;
use std::time::Duration;

use super::bounded;
use crate::errors::AppError;
use crate::models::{KeyRecordFilter, KeyRecordResponseDto, KeyStatsDto, KeyStatus};
use crate::repositories::{KeyQueueTrait, KeyRecordRepositoryTrait};

type Result<T> = std::result::Result<T, AppError>;

pub struct KeyInventoryService<R: KeyRecordRepositoryTrait, Q: KeyQueueTrait> {
    repository: Arc<R>,
    queue: Arc<Q>,
    timeout: Duration,
}

impl<R: KeyRecordRepositoryTrait, Q: KeyQueueTrait> KeyInventoryService<R, Q> {
    pub fn new(repository: Arc<R>, queue: Arc<Q>, timeout: Duration) -> Self {
        Self {
            repository,
            queue,
            timeout,
        }
    }

    async fn depth(&self) -> Result<u64> {
        bounded(self.timeout, "queue depth", async {
            self.queue.depth().await.map_err(AppError::from)
        })
        .await
    }

    async fn count_with(&self, status: KeyStatus) -> Result<i64> {
        let filter = KeyRecordFilter::new().with_status(status);
        bounded(self.timeout, "count key records", async {
            self.repository.count(&filter).await.map_err(AppError::from)
        })
        .await
    }

    pub async fn stats(&self) -> Result<KeyStatsDto> {
        let queued = self.depth().await?;
        let available = self.count_with(KeyStatus::Available).await?;
        let used = self.count_with(KeyStatus::Used).await?;

        Ok(KeyStatsDto {
            queued,
            available,
            used,
        })
    }

    pub async fn get_by_key(&self, key: &str) -> Result<KeyRecordResponseDto> {
        bounded(self.timeout, "find key record", async {
            self.repository.find_by_key(key).await.map_err(AppError::from)
        })
        .await?
        .map(KeyRecordResponseDto::from)
        .ok_or_else(|| AppError::NotFound(format!("Key '{}' not found", key)))
    }

    /// Tops the queue up to `target` keys with a single batch
    pub async fn top_up<G>(&self, generator: &G, target: u64) -> Result<u64>
    where
        G: super::KeyGeneratorTrait + ?Sized,
    {
        let depth = self.depth().await?;
        if depth >= target {
            return Ok(0);
        }

        let missing = target - depth;
        generator.generate(missing as usize).await?;
        Ok(missing)
    }
}

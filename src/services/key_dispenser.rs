// src/services/key_dispenser.rs - Request path of the key allocator
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::time::timeout;

use super::bounded;
use super::key_generator::KeyGeneratorTrait;
use crate::errors::KeyServiceError;
use crate::models::{KeyRecordFilter, KeyStatus};
use crate::repositories::{KeyQueueTrait, KeyRecordRepositoryTrait};

type Result<T> = std::result::Result<T, KeyServiceError>;

#[async_trait]
pub trait KeyDispenserTrait: Send + Sync {
    /// Hands out one unused key. Every successful call returns a different key.
    async fn dispense(&self) -> Result<String>;
}

/// Refill thresholds for the dispenser
#[derive(Debug, Clone, Copy)]
pub struct RefillPolicy {
    pub low_water_mark: u64,
    pub batch_size: usize,
}

pub struct KeyDispenserService<R, Q, G>
where
    R: KeyRecordRepositoryTrait,
    Q: KeyQueueTrait,
    G: KeyGeneratorTrait,
{
    repository: Arc<R>,
    queue: Arc<Q>,
    generator: Arc<G>,
    policy: RefillPolicy,
    timeout: Duration,
}

impl<R, Q, G> KeyDispenserService<R, Q, G>
where
    R: KeyRecordRepositoryTrait + 'static,
    Q: KeyQueueTrait + 'static,
    G: KeyGeneratorTrait,
{
    pub fn new(
        repository: Arc<R>,
        queue: Arc<Q>,
        generator: Arc<G>,
        policy: RefillPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            repository,
            queue,
            generator,
            policy,
            timeout,
        }
    }

    /// Runs one synchronous refill when the queue is below the low-water mark.
    ///
    /// A failed refill is only logged; the pop that follows decides whether
    /// the caller gets a key.
    async fn refill_if_low(&self) -> Result<()> {
        let depth = bounded(self.timeout, "queue depth", async {
            self.queue
                .depth()
                .await
                .map_err(|e| KeyServiceError::QueueUnavailable(e.to_string()))
        })
        .await?;

        if depth >= self.policy.low_water_mark {
            return Ok(());
        }

        info!(
            "Queue depth {} is below the low-water mark {}, generating {} keys",
            depth, self.policy.low_water_mark, self.policy.batch_size
        );

        if let Err(e) = self.generator.generate(self.policy.batch_size).await {
            error!("Refill of {} keys failed: {}", self.policy.batch_size, e);
        }

        Ok(())
    }
}

/// Marks a popped key used, or puts it back on the queue.
///
/// Runs detached from the request so that a cancelled caller cannot strand
/// the key between the pop and the status update.
async fn settle<R, Q>(repository: Arc<R>, queue: Arc<Q>, key: String, limit: Duration) -> Result<String>
where
    R: KeyRecordRepositoryTrait,
    Q: KeyQueueTrait,
{
    let filter = KeyRecordFilter::new()
        .with_key(key.as_str())
        .with_status(KeyStatus::Available);

    let reason = match timeout(limit, repository.update_status(&filter, KeyStatus::Used)).await {
        Ok(Ok(affected)) if affected > 0 => {
            debug!("Dispensed key '{}'", key);
            return Ok(key);
        }
        Ok(Ok(_)) => "no available record matched".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("status update exceeded {}ms", limit.as_millis()),
    };

    warn!("Could not mark key '{}' used ({}), returning it to the queue", key, reason);

    match timeout(limit, queue.push_front(slice::from_ref(&key))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Failed to return key '{}' to the queue: {}", key, e),
        Err(_) => error!("Timed out returning key '{}' to the queue", key),
    }

    Err(KeyServiceError::PersistenceRace(key))
}

#[async_trait]
impl<R, Q, G> KeyDispenserTrait for KeyDispenserService<R, Q, G>
where
    R: KeyRecordRepositoryTrait + 'static,
    Q: KeyQueueTrait + 'static,
    G: KeyGeneratorTrait,
{
    async fn dispense(&self) -> Result<String> {
        self.refill_if_low().await?;

        let popped = bounded(self.timeout, "queue pop", async {
            self.queue
                .pop_back()
                .await
                .map_err(|e| KeyServiceError::QueueUnavailable(e.to_string()))
        })
        .await?;

        let key = match popped {
            Some(key) => key,
            None => {
                warn!("Key queue is empty after the refill attempt");
                return Err(KeyServiceError::NoKeysAvailable);
            }
        };

        let settling = tokio::spawn(settle(
            self.repository.clone(),
            self.queue.clone(),
            key,
            self.timeout,
        ));

        settling
            .await
            .map_err(|e| KeyServiceError::Internal(format!("Key settlement task failed: {}", e)))?
    }
}

// src/services/key_generator.rs - Batch key generation
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
#[cfg(test)]
use mockall::automock;

use super::bounded;
use crate::errors::{KeyServiceError, RepositoryError};
use crate::models::NewKeyRecord;
use crate::repositories::{KeyQueueTrait, KeyRecordRepositoryTrait};
use crate::utils::{KeyEncoder, KeySeed, KeyStrategy};

type Result<T> = std::result::Result<T, KeyServiceError>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyGeneratorTrait: Send + Sync {
    /// Creates `count` new keys, stores them as available and queues them.
    ///
    /// An error means no key of the batch reached the queue.
    async fn generate(&self, count: usize) -> Result<()>;
}

pub struct KeyGeneratorService<R: KeyRecordRepositoryTrait, Q: KeyQueueTrait> {
    repository: Arc<R>,
    queue: Arc<Q>,
    encoder: KeyEncoder,
    timeout: Duration,
}

impl<R: KeyRecordRepositoryTrait, Q: KeyQueueTrait> KeyGeneratorService<R, Q> {
    pub fn new(repository: Arc<R>, queue: Arc<Q>, encoder: KeyEncoder, timeout: Duration) -> Self {
        Self {
            repository,
            queue,
            encoder,
            timeout,
        }
    }

    /// Produces `count` keys that are distinct within the batch
    async fn produce_keys(&self, count: usize) -> Result<Vec<String>> {
        match self.encoder.strategy() {
            KeyStrategy::Counter => {
                let seeds = bounded(self.timeout, "reserve key seeds", async {
                    self.repository
                        .reserve_seeds(count)
                        .await
                        .map_err(|e| KeyServiceError::GenerationFailed(e.to_string()))
                })
                .await
                .map_err(into_generation_failure)?;

                if seeds.len() != count {
                    return Err(KeyServiceError::GenerationFailed(format!(
                        "Key counter returned {} seeds, expected {}",
                        seeds.len(),
                        count
                    )));
                }

                seeds
                    .into_iter()
                    .map(|seed| self.encoder.encode(KeySeed::Counter(seed)).map_err(Into::into))
                    .collect()
            }
            KeyStrategy::Random => {
                if count as u64 > self.encoder.keyspace() {
                    return Err(KeyServiceError::InvalidBatchSize(format!(
                        "{} keys requested but only {} exist at length {}",
                        count,
                        self.encoder.keyspace(),
                        self.encoder.length()
                    )));
                }

                let mut seen = HashSet::with_capacity(count);
                let mut keys = Vec::with_capacity(count);

                while keys.len() < count {
                    let key = self.encoder.encode(KeySeed::Random)?;
                    if seen.insert(key.clone()) {
                        keys.push(key);
                    }
                }

                Ok(keys)
            }
        }
    }
}

/// A timeout on the durable side is a failed batch
fn into_generation_failure(err: KeyServiceError) -> KeyServiceError {
    match err {
        KeyServiceError::Timeout(msg) => KeyServiceError::GenerationFailed(msg),
        other => other,
    }
}

#[async_trait]
impl<R, Q> KeyGeneratorTrait for KeyGeneratorService<R, Q>
where
    R: KeyRecordRepositoryTrait + 'static,
    Q: KeyQueueTrait + 'static,
{
    async fn generate(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(KeyServiceError::InvalidBatchSize(
                "Batch size must be positive".to_string(),
            ));
        }

        let keys = self.produce_keys(count).await.map_err(|e| {
            error!("Failed to produce {} candidate keys: {}", count, e);
            e
        })?;

        let records: Vec<NewKeyRecord> = keys.iter().cloned().map(NewKeyRecord::available).collect();

        bounded(self.timeout, "insert key batch", async {
            self.repository
                .insert_batch(&records)
                .await
                .map_err(|e| match e {
                    RepositoryError::Conflict(msg) => KeyServiceError::DuplicateKey(msg),
                    other => KeyServiceError::GenerationFailed(other.to_string()),
                })
        })
        .await
        .map_err(|e| {
            error!("Key batch of {} was not stored, nothing queued: {}", count, e);
            into_generation_failure(e)
        })?;

        debug!("Stored {} available keys", count);

        // The batch is durable from here on; a failed push only hides it from dispensing
        let pushed = bounded(self.timeout, "queue key batch", async {
            self.queue
                .push_front(&keys)
                .await
                .map_err(|e| KeyServiceError::QueueUnavailable(e.to_string()))
        })
        .await;

        match pushed {
            Ok(()) => info!(
                "Generated and queued {} keys using the {} strategy",
                count,
                self.encoder.strategy()
            ),
            Err(e) => warn!(
                "{} keys are stored as available but were not queued and need reconciliation: {}",
                count, e
            ),
        }

        Ok(())
    }
}

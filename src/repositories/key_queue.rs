// src/repositories/key_queue.rs - Working set of available keys
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::errors::QueueError;
use crate::queue_store::QueueStore;

type Result<T> = std::result::Result<T, QueueError>;

/// A list of available keys. Generation pushes onto the front, dispensing
/// pops off the back, so keys leave in the order they were queued.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyQueueTrait: Send + Sync {
    /// Pushes keys onto the front of the queue in one atomic call
    async fn push_front(&self, keys: &[String]) -> Result<()>;

    /// Removes and returns the key at the back, `None` if the queue is empty
    async fn pop_back(&self) -> Result<Option<String>>;

    /// Number of keys currently queued
    async fn depth(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct KeyQueue {
    conn: ConnectionManager,
    queue_name: String,
}

impl KeyQueue {
    pub fn new(store: &QueueStore, queue_name: impl Into<String>) -> Self {
        Self {
            conn: store.connection(),
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl KeyQueueTrait for KeyQueue {
    async fn push_front(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let depth: u64 = conn.lpush(&self.queue_name, keys).await?;

        debug!(
            "Pushed {} keys onto '{}', depth now {}",
            keys.len(),
            self.queue_name,
            depth
        );
        Ok(())
    }

    async fn pop_back(&self) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let key: Option<String> = conn.rpop(&self.queue_name, None).await?;
        Ok(key)
    }

    async fn depth(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let depth: u64 = conn.llen(&self.queue_name).await?;
        Ok(depth)
    }
}

//! In-memory stand-ins for Postgres, Redis and the entropy source. The store
//! doubles keep the real atomicity: batch inserts are all-or-nothing, status
//! updates are conditional per row, and queue operations hold a single lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::errors::{QueueError, RepositoryError};
use crate::models::{KeyRecord, KeyRecordFilter, KeyStatus, NewKeyRecord};
use crate::repositories::{KeyQueueTrait, KeyRecordRepositoryTrait};
use crate::utils::key_encoder::EncoderError;
use crate::utils::RandomSource;

/// A random source whose every draw fails
#[derive(Debug)]
pub struct ExhaustedRandomSource;

impl RandomSource for ExhaustedRandomSource {
    fn next_u64(&self) -> Result<u64, EncoderError> {
        Err(EncoderError::EntropyUnavailable(
            "entropy pool exhausted".to_string(),
        ))
    }
}

async fn stall(delay: &Mutex<Option<Duration>>) {
    let delay = *delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn matches(record: &KeyRecord, filter: &KeyRecordFilter) -> bool {
    filter.key.as_ref().map_or(true, |k| *k == record.key)
        && filter.status.map_or(true, |s| s == record.status)
}

#[derive(Default)]
pub struct InMemoryKeyRecordRepository {
    records: Mutex<HashMap<String, KeyRecord>>,
    next_id: AtomicI64,
    next_seed: Mutex<u64>,
    failing_inserts: AtomicUsize,
    failing_updates: AtomicUsize,
    update_delay: Mutex<Option<Duration>>,
    read_delay: Mutex<Option<Duration>>,
}

impl InMemoryKeyRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_existing(&self, key: &str, status: KeyStatus) {
        let record = KeyRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            key: key.to_string(),
            status,
            created_at: Utc::now(),
            used_at: (status == KeyStatus::Used).then(Utc::now),
        };
        self.records.lock().unwrap().insert(key.to_string(), record);
    }

    pub fn fail_next_inserts(&self, times: usize) {
        self.failing_inserts.store(times, Ordering::SeqCst);
    }

    pub fn fail_next_updates(&self, times: usize) {
        self.failing_updates.store(times, Ordering::SeqCst);
    }

    pub fn delay_updates(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    pub fn status_of(&self, key: &str) -> Option<KeyStatus> {
        self.records.lock().unwrap().get(key).map(|r| r.status)
    }

    pub fn count_status(&self, status: KeyStatus) -> usize {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn total(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl KeyRecordRepositoryTrait for InMemoryKeyRecordRepository {
    async fn insert_batch(&self, records: &[NewKeyRecord]) -> Result<u64, RepositoryError> {
        if take_one(&self.failing_inserts) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut stored = self.records.lock().unwrap();
        let mut batch = HashMap::with_capacity(records.len());

        for record in records {
            if stored.contains_key(&record.key) || batch.contains_key(&record.key) {
                return Err(RepositoryError::Conflict(format!(
                    "Key '{}' already exists",
                    record.key
                )));
            }
            batch.insert(
                record.key.clone(),
                KeyRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    key: record.key.clone(),
                    status: record.status,
                    created_at: record.created_at,
                    used_at: None,
                },
            );
        }

        let inserted = batch.len() as u64;
        stored.extend(batch);
        Ok(inserted)
    }

    async fn update_status(
        &self,
        filter: &KeyRecordFilter,
        status: KeyStatus,
    ) -> Result<u64, RepositoryError> {
        stall(&self.update_delay).await;

        if take_one(&self.failing_updates) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let (key, expected) = match (&filter.key, filter.status) {
            (Some(key), Some(expected)) => (key, expected),
            _ => {
                return Err(RepositoryError::InvalidData(
                    "Status update requires both key and expected status".to_string(),
                ))
            }
        };

        let mut stored = self.records.lock().unwrap();
        match stored.get_mut(key) {
            Some(record) if record.status == expected => {
                record.status = status;
                if status == KeyStatus::Used {
                    record.used_at = Some(Utc::now());
                }
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find(
        &self,
        filter: &KeyRecordFilter,
        limit: Option<i64>,
    ) -> Result<Vec<KeyRecord>, RepositoryError> {
        stall(&self.read_delay).await;
        let stored = self.records.lock().unwrap();
        let mut found: Vec<KeyRecord> = stored.values().filter(|r| matches(r, filter)).cloned().collect();
        found.sort_by_key(|r| r.id);

        if let Some(limit) = limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<KeyRecord>, RepositoryError> {
        stall(&self.read_delay).await;
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn count(&self, filter: &KeyRecordFilter) -> Result<i64, RepositoryError> {
        stall(&self.read_delay).await;
        let stored = self.records.lock().unwrap();
        Ok(stored.values().filter(|r| matches(r, filter)).count() as i64)
    }

    async fn reserve_seeds(&self, count: usize) -> Result<Vec<u64>, RepositoryError> {
        let mut next = self.next_seed.lock().unwrap();
        let start = *next;
        *next += count as u64;
        Ok((start..*next).collect())
    }
}

#[derive(Default)]
pub struct InMemoryKeyQueue {
    keys: Mutex<VecDeque<String>>,
    read_delay: Mutex<Option<Duration>>,
}

impl InMemoryKeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_keys(&self, keys: &[&str]) {
        let mut queue = self.keys.lock().unwrap();
        for key in keys {
            queue.push_front(key.to_string());
        }
    }

    /// Delays every `depth` and `pop_back` call
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Queue contents from front to back
    pub fn snapshot(&self) -> Vec<String> {
        self.keys.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl KeyQueueTrait for InMemoryKeyQueue {
    async fn push_front(&self, keys: &[String]) -> Result<(), QueueError> {
        let mut queue = self.keys.lock().unwrap();
        for key in keys {
            queue.push_front(key.clone());
        }
        Ok(())
    }

    async fn pop_back(&self) -> Result<Option<String>, QueueError> {
        stall(&self.read_delay).await;
        Ok(self.keys.lock().unwrap().pop_back())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        stall(&self.read_delay).await;
        Ok(self.keys.lock().unwrap().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_pops_in_push_order() {
        let queue = InMemoryKeyQueue::new();
        queue
            .push_front(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(queue.pop_back().await.unwrap().as_deref(), Some("first"));
        assert_eq!(queue.pop_back().await.unwrap().as_deref(), Some("second"));
        assert_eq!(queue.pop_back().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conditional_update_applies_once() {
        let repository = InMemoryKeyRecordRepository::new();
        repository.insert_existing("abc123", KeyStatus::Available);

        let filter = KeyRecordFilter::new()
            .with_key("abc123")
            .with_status(KeyStatus::Available);

        assert_eq!(repository.update_status(&filter, KeyStatus::Used).await.unwrap(), 1);
        assert_eq!(repository.update_status(&filter, KeyStatus::Used).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_without_expected_status_is_rejected() {
        let repository = InMemoryKeyRecordRepository::new();
        repository.insert_existing("abc123", KeyStatus::Available);

        let filter = KeyRecordFilter::new().with_key("abc123");
        let result = repository.update_status(&filter, KeyStatus::Used).await;

        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
        assert_eq!(repository.status_of("abc123"), Some(KeyStatus::Available));
    }
}

// src/repositories/key_record.rs - Durable key records
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
#[cfg(test)]
use mockall::automock;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{KeyRecord, KeyRecordFilter, KeyStatus, NewKeyRecord};

type Result<T> = std::result::Result<T, RepositoryError>;

/// Rows per INSERT statement; three binds per row keeps us under the
/// Postgres limit of 65535 bind parameters.
const INSERT_CHUNK_SIZE: usize = 10_000;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyRecordRepositoryTrait: Send + Sync {
    /// Inserts a batch of key records atomically
    ///
    /// ### Arguments
    /// * `records` - The records to insert
    ///
    /// ### Returns
    /// * `Result<u64>` - Number of rows inserted, always `records.len()` on success
    ///
    /// ### Errors
    /// * `RepositoryError::Conflict` - If any key already exists; no row of the batch is kept
    /// * `RepositoryError::Database` - If a database error occurs; no row of the batch is kept
    async fn insert_batch(&self, records: &[NewKeyRecord]) -> Result<u64>;

    /// Moves matching records to `status`
    ///
    /// ### Arguments
    /// * `filter` - Must name both `key` and the expected prior `status`
    /// * `status` - The new status
    ///
    /// ### Returns
    /// * `Result<u64>` - Number of rows modified; zero when the expected prior status did not match
    ///
    /// ### Errors
    /// * `RepositoryError::InvalidData` - If the filter does not name both fields
    /// * `RepositoryError::Database` - If a database error occurs
    async fn update_status(&self, filter: &KeyRecordFilter, status: KeyStatus) -> Result<u64>;

    /// Finds key records by filter, oldest first
    async fn find(&self, filter: &KeyRecordFilter, limit: Option<i64>) -> Result<Vec<KeyRecord>>;

    /// Finds a key record by its key
    async fn find_by_key(&self, key: &str) -> Result<Option<KeyRecord>>;

    /// Counts key records by filter
    async fn count(&self, filter: &KeyRecordFilter) -> Result<i64>;

    /// Reserves `count` fresh values from the persisted key counter, ascending
    async fn reserve_seeds(&self, count: usize) -> Result<Vec<u64>>;
}

// Implementation using actual database
pub struct KeyRecordRepository {
    pool: PgPool,
}

impl KeyRecordRepository {
    pub fn new(db: Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }

    // Helper method for transactions
    async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            log::error!("Failed to start database transaction: {}", e);
            RepositoryError::Database(e)
        })
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &KeyRecordFilter) {
    if let Some(key) = &filter.key {
        builder.push(" AND key = ");
        builder.push_bind(key.clone());
    }

    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
}

#[async_trait]
impl KeyRecordRepositoryTrait for KeyRecordRepository {
    async fn insert_batch(&self, records: &[NewKeyRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        // One transaction for the whole batch so a partial failure leaves nothing behind
        let mut tx = self.begin_transaction().await?;
        let mut inserted = 0;

        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let mut builder = QueryBuilder::new("INSERT INTO short_keys (key, status, created_at) ");
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.key.clone())
                    .push_bind(record.status.as_str())
                    .push_bind(record.created_at);
            });

            let result = builder.build().execute(&mut *tx).await.map_err(|e| {
                log::error!("Failed to insert key batch: {}", e);
                RepositoryError::from(e)
            })?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            log::error!("Failed to commit key batch: {}", e);
            RepositoryError::Database(e)
        })?;

        debug!("Inserted {} key records", inserted);
        Ok(inserted)
    }

    async fn update_status(&self, filter: &KeyRecordFilter, status: KeyStatus) -> Result<u64> {
        let (key, expected) = match (&filter.key, filter.status) {
            (Some(key), Some(expected)) => (key.clone(), expected),
            _ => {
                return Err(RepositoryError::InvalidData(
                    "Status update requires both key and expected status".to_string(),
                ))
            }
        };

        let mut builder = QueryBuilder::new("UPDATE short_keys SET status = ");
        builder.push_bind(status.as_str());

        if status == KeyStatus::Used {
            builder.push(", used_at = ").push_bind(Utc::now());
        }

        builder.push(" WHERE key = ").push_bind(key.clone());
        builder.push(" AND status = ").push_bind(expected.as_str());

        let result = builder.build().execute(&self.pool).await?;
        let affected = result.rows_affected();

        debug!(
            "Status update {} -> {} for key '{}' affected {} rows",
            expected, status, key, affected
        );
        Ok(affected)
    }

    async fn find(&self, filter: &KeyRecordFilter, limit: Option<i64>) -> Result<Vec<KeyRecord>> {
        let mut query_builder = QueryBuilder::new(
            "SELECT id, key, status, created_at, used_at
            FROM short_keys
            WHERE 1=1",
        );

        push_filter(&mut query_builder, filter);

        query_builder.push(" ORDER BY id ASC");

        if let Some(limit) = limit {
            query_builder.push(" LIMIT ");
            query_builder.push_bind(limit);
        }

        let results = query_builder
            .build_query_as::<KeyRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(results)
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<KeyRecord>> {
        let filter = KeyRecordFilter::new().with_key(key);

        self.find(&filter, Some(1))
            .await
            .map(|results| results.into_iter().next())
    }

    async fn count(&self, filter: &KeyRecordFilter) -> Result<i64> {
        let mut query_builder = QueryBuilder::new("SELECT COUNT(*) FROM short_keys WHERE 1=1");
        push_filter(&mut query_builder, filter);

        let total = query_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn reserve_seeds(&self, count: usize) -> Result<Vec<u64>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let values: Vec<i64> =
            sqlx::query_scalar("SELECT nextval('short_key_seed_seq') FROM generate_series(1, $1)")
                .bind(count as i64)
                .fetch_all(&self.pool)
                .await?;

        let mut seeds = values
            .into_iter()
            .map(|v| {
                u64::try_from(v).map_err(|_| {
                    RepositoryError::InvalidData(format!("Key counter returned negative value {}", v))
                })
            })
            .collect::<Result<Vec<u64>>>()?;
        seeds.sort_unstable();

        Ok(seeds)
    }
}

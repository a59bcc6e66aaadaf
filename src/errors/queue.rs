use redis::RedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// Command or connection failure reported by Redis
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// Could not establish the initial connection
    #[error("Redis connection error: {0}")]
    Connection(String),
}

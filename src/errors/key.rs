use thiserror::Error;

use crate::utils::EncoderError;

/// Failures of the key allocator. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum KeyServiceError {
    /// The secure random source failed while encoding
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),

    /// The batch collided with an existing key and was rejected as a whole
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The batch could not be written durably; nothing was queued
    #[error("Key generation failed: {0}")]
    GenerationFailed(String),

    /// The queue was empty even after the refill attempt
    #[error("No keys available")]
    NoKeysAvailable,

    /// The popped key could not be marked used and was pushed back
    #[error("Persistence race: key '{0}' could not be marked used and was returned to the queue")]
    PersistenceRace(String),

    /// Reading from the queue failed
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    /// A store call exceeded the operation deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KeyServiceError {
    /// Conditions a caller can resolve by simply calling again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoKeysAvailable | Self::PersistenceRace(_) | Self::QueueUnavailable(_) | Self::Timeout(_)
        )
    }
}

impl From<EncoderError> for KeyServiceError {
    fn from(err: EncoderError) -> Self {
        match err {
            EncoderError::EntropyUnavailable(msg) => Self::EntropyUnavailable(msg),
        }
    }
}

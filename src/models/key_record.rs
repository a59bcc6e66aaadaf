// src/models/key_record.rs - Pure data structures
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Lifecycle of a key record. Only `Available -> Used` is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Available,
    Used,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Available => "available",
            KeyStatus::Used => "used",
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for KeyStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "available" => Ok(KeyStatus::Available),
            "used" => Ok(KeyStatus::Used),
            other => Err(format!("Unknown key status: {}", other)),
        }
    }
}

/// A durable key record. Doubles as the audit trail of every key ever issued.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Surrogate identifier
    pub id: i64,

    /// The short key itself, unique for the lifetime of the system
    pub key: String,

    #[sqlx(try_from = "String")]
    pub status: KeyStatus,

    pub created_at: DateTime<Utc>,

    /// Set when the key is dispensed
    pub used_at: Option<DateTime<Utc>>,
}

/// A record about to be inserted by the generator
#[derive(Debug, Clone, PartialEq)]
pub struct NewKeyRecord {
    pub key: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

impl NewKeyRecord {
    pub fn available(key: String) -> Self {
        Self {
            key,
            status: KeyStatus::Available,
            created_at: Utc::now(),
        }
    }
}

/// Field-keyed filter over key records.
///
/// Only fields that are `Some` become predicates; an unset field never
/// matches on a default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRecordFilter {
    pub key: Option<String>,
    pub status: Option<KeyStatus>,
}

impl KeyRecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_status(mut self, status: KeyStatus) -> Self {
        self.status = Some(status);
        self
    }
}

// DTO for the administrative seeding request
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct GenerateKeysDto {
    #[validate(range(min = 1, max = 100000, message = "Count must be between 1 and 100000"))]
    pub count: u32,
}

// DTO returned by GetKey
#[derive(Debug, Serialize, Deserialize)]
pub struct DispensedKeyDto {
    pub key: String,
}

// DTO for key inventory figures
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyStatsDto {
    pub queued: u64,
    pub available: i64,
    pub used: i64,
}

// DTO for response with key record details
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyRecordResponseDto {
    pub key: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<KeyRecord> for KeyRecordResponseDto {
    fn from(record: KeyRecord) -> Self {
        KeyRecordResponseDto {
            key: record.key,
            status: record.status,
            created_at: record.created_at,
            used_at: record.used_at,
        }
    }
}

use std::{fmt, str::FromStr, sync::Arc};

use rand::{rngs::OsRng, TryRngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::base62::{encode_base62, keyspace, MAX_KEY_LENGTH};

/// How new keys are derived. One strategy is used per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Base62 of a persisted, strictly increasing counter
    Counter,
    /// Base62 of a cryptographically secure random integer
    Random,
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "counter" => Ok(KeyStrategy::Counter),
            "random" => Ok(KeyStrategy::Random),
            _ => Err(format!(
                "Invalid key strategy: {}. Must be one of: counter, random",
                s
            )),
        }
    }
}

impl fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::Counter => write!(f, "counter"),
            KeyStrategy::Random => write!(f, "random"),
        }
    }
}

/// Input to a single encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySeed {
    Counter(u64),
    Random,
}

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),
}

/// Supplies 64-bit draws for the random strategy
pub trait RandomSource: fmt::Debug + Send + Sync {
    fn next_u64(&self) -> Result<u64, EncoderError>;
}

/// The operating system's secure random source
#[derive(Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn next_u64(&self) -> Result<u64, EncoderError> {
        OsRng
            .try_next_u64()
            .map_err(|e| EncoderError::EntropyUnavailable(e.to_string()))
    }
}

/// Maps seeds to fixed-length base62 keys.
#[derive(Debug, Clone)]
pub struct KeyEncoder {
    strategy: KeyStrategy,
    length: usize,
    source: Arc<dyn RandomSource>,
}

impl KeyEncoder {
    /// `length` is clamped to 1..=10 so that the random keyspace fits a u64.
    pub fn new(strategy: KeyStrategy, length: usize) -> Self {
        Self {
            strategy,
            length: length.clamp(1, MAX_KEY_LENGTH),
            source: Arc::new(OsRandom),
        }
    }

    /// Replaces the random source used by the random strategy
    pub fn with_random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.source = source;
        self
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of keys representable at the configured length
    pub fn keyspace(&self) -> u64 {
        keyspace(self.length).unwrap_or(u64::MAX)
    }

    pub fn encode(&self, seed: KeySeed) -> Result<String, EncoderError> {
        match seed {
            KeySeed::Counter(value) => Ok(self.encode_counter(value)),
            KeySeed::Random => self.encode_random(),
        }
    }

    /// Deterministic and infallible; grows past `length` once the counter
    /// leaves the fixed-width range.
    pub fn encode_counter(&self, value: u64) -> String {
        encode_base62(value, self.length)
    }

    /// Draws uniformly from `[0, 62^length)` using rejection sampling.
    pub fn encode_random(&self) -> Result<String, EncoderError> {
        let limit = self.keyspace();
        // Largest accepted draw; values above it would bias the low residues
        let zone = u64::MAX - (u64::MAX % limit + 1) % limit;

        loop {
            let draw = self.source.next_u64()?;

            if draw <= zone {
                return Ok(encode_base62(draw % limit, self.length));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::testing::ExhaustedRandomSource;

    /// Replays a fixed list of draws
    #[derive(Debug)]
    struct ScriptedSource(Mutex<Vec<u64>>);

    impl RandomSource for ScriptedSource {
        fn next_u64(&self) -> Result<u64, EncoderError> {
            let mut draws = self.0.lock().unwrap();
            if draws.is_empty() {
                return Err(EncoderError::EntropyUnavailable("script exhausted".to_string()));
            }
            Ok(draws.remove(0))
        }
    }

    #[test]
    fn test_counter_encoding_is_deterministic_and_increasing() {
        let encoder = KeyEncoder::new(KeyStrategy::Counter, 6);

        let keys: Vec<String> = (0..3).map(|n| encoder.encode_counter(n)).collect();
        assert_eq!(keys, vec!["000000", "000001", "000002"]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(encoder.encode(KeySeed::Counter(1)).unwrap(), "000001");
        assert_eq!(encoder.encode_counter(123_456), encoder.encode_counter(123_456));
    }

    #[test]
    fn test_counter_encoding_is_collision_free() {
        let encoder = KeyEncoder::new(KeyStrategy::Counter, 6);
        let mut seen = HashSet::new();

        for n in 0..20_000u64 {
            let key = encoder.encode_counter(n * 2_840_011);
            assert_eq!(key.len(), 6);
            assert!(seen.insert(key), "Duplicate key for seed {}", n);
        }
    }

    #[test]
    fn test_random_keys_have_fixed_length_and_alphabet() {
        let encoder = KeyEncoder::new(KeyStrategy::Random, 6);

        for _ in 0..500 {
            let key = encoder.encode(KeySeed::Random).unwrap();
            assert_eq!(key.len(), 6);
            assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_random_encoding_rejects_biased_draws() {
        // u64::MAX lands in the rejected tail for a limit of 62
        let source = ScriptedSource(Mutex::new(vec![u64::MAX, 63]));
        let encoder =
            KeyEncoder::new(KeyStrategy::Random, 1).with_random_source(Arc::new(source));

        assert_eq!(encoder.encode_random().unwrap(), "1");
    }

    #[test]
    fn test_random_encoding_propagates_entropy_failure() {
        let encoder = KeyEncoder::new(KeyStrategy::Random, 6)
            .with_random_source(Arc::new(ExhaustedRandomSource));

        let result = encoder.encode(KeySeed::Random);
        assert!(matches!(result, Err(EncoderError::EntropyUnavailable(_))));
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(KeyEncoder::new(KeyStrategy::Random, 0).length(), 1);
        assert_eq!(KeyEncoder::new(KeyStrategy::Random, 40).length(), MAX_KEY_LENGTH);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("counter".parse::<KeyStrategy>(), Ok(KeyStrategy::Counter));
        assert_eq!("RANDOM".parse::<KeyStrategy>(), Ok(KeyStrategy::Random));
        assert!("uuid".parse::<KeyStrategy>().is_err());
        assert!("sequence".parse::<KeyStrategy>().is_err());
    }
}

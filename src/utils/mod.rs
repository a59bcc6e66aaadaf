pub mod base62;
pub mod key_encoder;

pub use key_encoder::{EncoderError, KeyEncoder, KeySeed, KeyStrategy, RandomSource};

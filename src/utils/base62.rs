/// Base62 alphabet (0-9, a-z, A-Z). The first character doubles as the padding digit.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const BASE: u64 = 62;

/// Longest key whose whole keyspace still fits in a u64 (62^10 < 2^64 < 62^11)
pub const MAX_KEY_LENGTH: usize = 10;

/// Converts a number to base62, left-padded with '0' up to `min_width`.
///
/// Values needing more than `min_width` digits are never truncated.
pub fn encode_base62(mut num: u64, min_width: usize) -> String {
    let mut digits = Vec::with_capacity(min_width.max(11));

    if num == 0 {
        digits.push(ALPHABET[0]);
    }

    while num > 0 {
        digits.push(ALPHABET[(num % BASE) as usize]);
        num /= BASE;
    }

    while digits.len() < min_width {
        digits.push(ALPHABET[0]);
    }

    digits.iter().rev().map(|&b| b as char).collect()
}

/// Number of distinct keys of the given length, `None` if it overflows a u64
pub fn keyspace(length: usize) -> Option<u64> {
    u32::try_from(length).ok().and_then(|exp| BASE.checked_pow(exp))
}

/// True when every character belongs to the base62 alphabet
pub fn is_base62(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_alphanumeric())
}

use validator::ValidationError;

use crate::utils::base62::is_base62;

/// Longest key a record can hold
const MAX_STORED_KEY_LENGTH: usize = 16;

/// Validates a key received on the lookup path:
/// - Between 1-16 characters
/// - Only base62 characters
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() || key.len() > MAX_STORED_KEY_LENGTH {
        let mut err = ValidationError::new("key_length");
        err.message = Some("Key must be between 1 and 16 characters".into());
        return Err(err);
    }

    if !is_base62(key) {
        let mut err = ValidationError::new("key_alphabet");
        err.message = Some("Key can only contain the characters 0-9, a-z and A-Z".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("000000").is_ok());
        assert!(validate_key("aZ9").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key(&"a".repeat(17)).is_err());
        assert!(validate_key("abc-12").is_err());
        assert!(validate_key("ключ").is_err());
    }

    #[test]
    fn test_validate_key_reports_reason() {
        let err = validate_key("bad_key").unwrap_err();
        assert_eq!(err.code, "key_alphabet");
    }
}

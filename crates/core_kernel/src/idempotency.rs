//! Idempotency keys for exactly-once payment submission
//!
//! An `IdempotencyKey` is a caller-supplied token. The storage layer enforces
//! uniqueness per store; resubmitting the same key returns the original
//! attempt's outcome instead of creating a second record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum key length accepted from callers
const MAX_KEY_LEN: usize = 64;

/// Errors from idempotency key validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdempotencyKeyError {
    #[error("Idempotency key must not be empty")]
    Empty,

    #[error("Idempotency key exceeds {MAX_KEY_LEN} characters: {0}")]
    TooLong(usize),

    #[error("Idempotency key contains invalid character: {0:?}")]
    InvalidCharacter(char),
}

/// A caller-supplied idempotency token
///
/// Keys are 1..=64 visible ASCII characters. Unique per store for the
/// lifetime of the attempt they identify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validates and wraps a raw key
    pub fn new(raw: impl Into<String>) -> Result<Self, IdempotencyKeyError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdempotencyKeyError::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(IdempotencyKeyError::TooLong(raw.len()));
        }
        if let Some(c) = raw.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(IdempotencyKeyError::InvalidCharacter(c));
        }
        Ok(Self(raw))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdempotencyKey {
    type Err = IdempotencyKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> String {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_key() {
        let key = IdempotencyKey::new("order-42/attempt-1").unwrap();
        assert_eq!(key.as_str(), "order-42/attempt-1");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(IdempotencyKey::new(""), Err(IdempotencyKeyError::Empty));
    }

    #[test]
    fn test_long_key_rejected() {
        let raw = "k".repeat(65);
        assert_eq!(
            IdempotencyKey::new(raw),
            Err(IdempotencyKeyError::TooLong(65))
        );
    }

    #[test]
    fn test_whitespace_rejected() {
        assert_eq!(
            IdempotencyKey::new("key with space"),
            Err(IdempotencyKeyError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let key = IdempotencyKey::new("pay-001").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"pay-001\"");
        let back: IdempotencyKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_invalid_deserialization_fails() {
        let result: Result<IdempotencyKey, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}

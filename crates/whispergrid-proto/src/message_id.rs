//! Hex-string message identifiers.
//!
//! Message ids are integers in `[1, MAX_MESSAGE_ID)` but live on the wire
//! (and in storage) as bare lowercase hex strings. Arithmetic and window
//! comparisons are numeric; one display-sort tie-break deliberately compares
//! the *hex strings* lexicographically and must stay that way for stable
//! ordering compatibility (see [`MessageId::cmp_hex`]).
//!
//! # Invariants
//!
//! - `0` is never a valid id.
//! - [`MessageId::next`] wraps to `1` at [`MAX_MESSAGE_ID`].

use std::fmt;

use rand::Rng as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::TokenError;

/// Exclusive upper bound for message ids: half of JavaScript's
/// `Number.MAX_SAFE_INTEGER`, fixed by the original wire format.
pub const MAX_MESSAGE_ID: u64 = ((1u64 << 53) - 1) / 2;

/// A message id: numeric value, hex-string wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    /// Construct from a numeric value.
    ///
    /// # Errors
    ///
    /// `TokenError::Malformed` when outside `[1, MAX_MESSAGE_ID)`.
    pub fn new(value: u64) -> Result<MessageId, TokenError> {
        if value == 0 || value >= MAX_MESSAGE_ID {
            return Err(TokenError::Malformed(format!("message id {value} out of range")));
        }
        Ok(MessageId(value))
    }

    /// Draw a fresh random id, uniform over the valid range.
    pub fn random() -> MessageId {
        MessageId(rand::rngs::OsRng.gen_range(1..MAX_MESSAGE_ID))
    }

    /// Parse the hex wire form.
    pub fn from_hex(text: &str) -> Result<MessageId, TokenError> {
        let value = u64::from_str_radix(text, 16)
            .map_err(|_| TokenError::Malformed(format!("invalid message id: {text}")))?;
        MessageId::new(value)
    }

    /// Lowercase hex wire form (no prefix, no padding).
    pub fn to_hex(self) -> String {
        format!("{:x}", self.0)
    }

    /// Numeric value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// The id following this one; wraps to `1` at the ceiling.
    pub fn next(self) -> MessageId {
        if self.0 + 1 >= MAX_MESSAGE_ID { MessageId(1) } else { MessageId(self.0 + 1) }
    }

    /// Lexicographic comparison of the hex forms.
    ///
    /// Not numeric order: `"a" > "10"` here. Used only as the stable-sort
    /// tie-break in thread display ordering, where the string comparison is
    /// part of the observable behavior.
    pub fn cmp_hex(self, other: MessageId) -> std::cmp::Ordering {
        self.to_hex().cmp(&other.to_hex())
    }
}

impl fmt::Display for MessageId {
    /// Shows the wire form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        MessageId::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let id = MessageId::new(0x1a2b).unwrap();
        assert_eq!(id.to_hex(), "1a2b");
        assert_eq!(MessageId::from_hex("1a2b").unwrap(), id);
    }

    #[test]
    fn zero_is_invalid() {
        assert!(MessageId::new(0).is_err());
        assert!(MessageId::from_hex("0").is_err());
    }

    #[test]
    fn ceiling_is_exclusive() {
        assert!(MessageId::new(MAX_MESSAGE_ID).is_err());
        assert!(MessageId::new(MAX_MESSAGE_ID - 1).is_ok());
    }

    #[test]
    fn increment_wraps_to_one() {
        let last = MessageId::new(MAX_MESSAGE_ID - 1).unwrap();
        assert_eq!(last.next().value(), 1);
        assert_eq!(MessageId::new(41).unwrap().next().value(), 42);
    }

    #[test]
    fn hex_comparison_is_lexicographic() {
        // Numerically 0x10 > 0xa, but "10" < "a" as strings.
        let small_hex = MessageId::new(0x10).unwrap();
        let big_hex = MessageId::new(0xa).unwrap();
        assert_eq!(small_hex.cmp_hex(big_hex), std::cmp::Ordering::Less);
        assert!(small_hex > big_hex);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let id = MessageId::new(255).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ff\"");
        assert_eq!(serde_json::from_str::<MessageId>("\"ff\"").unwrap(), id);
    }

    #[test]
    fn random_ids_are_in_range() {
        for _ in 0..100 {
            let id = MessageId::random();
            assert!(id.value() >= 1 && id.value() < MAX_MESSAGE_ID);
        }
    }
}

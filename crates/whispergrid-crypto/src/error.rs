//! Crypto error types.
//!
//! Decryption failures are deliberately opaque: a wrong password and
//! corrupted ciphertext produce the same error, so repeated unwrap attempts
//! never act as a password-validity oracle.

use thiserror::Error;

/// Errors produced by the cryptographic primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material could not be parsed or imported.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// An ECDSA signature failed verification.
    #[error("signature verification failed")]
    SignatureVerification,

    /// Authenticated decryption failed.
    ///
    /// Covers both wrong-password key unwrapping and tampered ciphertext.
    /// No further detail is exposed by design.
    #[error("decryption failed")]
    Decryption,

    /// JSON encoding or decoding of key material failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An encoded input (base64, hex, wrapped-key segments) was malformed.
    #[error("malformed input: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::Malformed(err.to_string())
    }
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        CryptoError::Malformed(err.to_string())
    }
}

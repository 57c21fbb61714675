//! Token codec error types.

use thiserror::Error;
use whispergrid_crypto::CryptoError;

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors produced while building, parsing or verifying tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token text does not have the `header.payload.signature` shape or
    /// a segment failed to decode.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The signature did not verify, or no usable verification key was
    /// available.
    ///
    /// "Cannot verify" and "verification failed" are deliberately one error
    /// kind: a token that cannot be checked must never be treated as
    /// weaker-but-present evidence.
    #[error("invalid token signature")]
    InvalidSignature,

    /// A payload did not match the structure its subject tag promises.
    #[error("unexpected payload for {subject}: {detail}")]
    UnexpectedPayload {
        /// Subject tag of the offending token.
        subject: String,
        /// What was wrong with the payload.
        detail: String,
    },

    /// JSON encoding of a header or payload failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An underlying cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::Serialization(err.to_string())
    }
}

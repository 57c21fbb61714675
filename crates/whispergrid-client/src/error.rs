//! Client error type.

use thiserror::Error;
use whispergrid_core::{IdentityError, OrderingError, StorageError, ThreadId};
use whispergrid_crypto::{CryptoError, Thumbprint};
use whispergrid_proto::{Subject, TokenError};

/// Errors from protocol-engine operations.
///
/// Lower-layer failures pass through transparently; the variants declared
/// here are the engine's own protocol-level failures. Duplicate delivery
/// is *not* an error (see `Appended::Duplicate`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A cryptographic primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A token failed to encode, parse or verify.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Storage access failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The ordering window rejected a message sequence.
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    /// Identity or thread-key management failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A token's signature does not bind to the expected sender. Raised
    /// when the cryptographic check fails against every key the thread
    /// recognizes, or when an embedded key claims an unknown author.
    #[error("signature does not match any recognized sender")]
    InvalidSignature,

    /// No thread record exists under this id.
    #[error("unknown thread: {0}")]
    ThreadNotFound(ThreadId),

    /// A reply-to-invite referenced an invitation this party never issued
    /// (or no longer stores).
    #[error("no stored invitation under {0}")]
    InvitationNotFound(Thumbprint),

    /// No stored identity record under this thumbprint.
    #[error("unknown identity: {0}")]
    IdentityNotFound(Thumbprint),

    /// A token of this subject has no meaning for the attempted
    /// operation (e.g. appending an invitation to a thread).
    #[error("token subject {0} is not valid here")]
    UnexpectedToken(Subject),

    /// A token lacked a header field its subject requires.
    #[error("token is missing required field {0}")]
    MissingField(&'static str),
}

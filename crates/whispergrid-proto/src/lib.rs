//! WhisperGrid token wire format.
//!
//! Token headers and payloads are base64url JSON for interoperability with
//! every existing reader. The `SignedToken` codec covers all wire
//! artifacts: invitations, thread replies, handshake replies,
//! self-encrypted blobs and backups, dispatched by the `sub` header tag.
//!
//! # Invariants
//!
//! - Each conversation subject maps to exactly one [`MessagePayload`]
//!   variant; parse sites match exhaustively.
//! - Round-trip: `parse(sign(h, p, k))` reproduces the header and payload,
//!   and verifies under `k`'s public half.
//! - Signature verification and identity binding are separate steps; the
//!   codec performs only the former.

mod errors;
mod header;
mod message_id;
pub mod payloads;
mod token;

pub use errors::{Result, TokenError};
pub use header::{Subject, TOKEN_ALG, TokenHeader};
pub use message_id::{MAX_MESSAGE_ID, MessageId};
pub use payloads::{InvitationPayload, MessagePayload, ReplyPayload};
pub use token::{Body, SignedToken};

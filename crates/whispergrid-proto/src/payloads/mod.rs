//! Typed token payloads.
//!
//! The wire carries JSON (or ciphertext) in the payload segment; these are
//! the typed forms. [`MessagePayload`] is the fully interpreted sum type a
//! reader ends up with after verification and (where needed) decryption:
//! one variant per conversation subject, matched exhaustively at every use
//! site so stringly-typed dispatch never leaks past the codec.
//! Self-encrypted blobs and backups stay opaque tokens; they never surface
//! as thread messages.

mod invitation;
mod reply;

pub use invitation::InvitationPayload;
pub use reply::ReplyPayload;
use whispergrid_crypto::{Jwk, Thumbprint};

/// A fully interpreted token payload.
///
/// A reply-to-invite *contains* the common reply structure rather than
/// duplicating it: ingestion extracts or synthesizes the thread context
/// from the extra handshake fields, then processes `reply` exactly like a
/// plain thread reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    /// Plaintext signed invitation.
    Invitation(InvitationPayload),

    /// Decrypted message within an established thread.
    Reply(ReplyPayload),

    /// Decrypted first message of a thread, with handshake extras.
    ReplyToInvite {
        /// Thumbprint of the invitation being answered.
        invite: Thumbprint,
        /// The replier's ephemeral ECDH public key.
        epk: Jwk,
        /// The embedded common reply.
        reply: ReplyPayload,
    },
}

impl MessagePayload {
    /// The inner reply, if this payload carries one.
    pub fn as_reply(&self) -> Option<&ReplyPayload> {
        match self {
            MessagePayload::Reply(reply) | MessagePayload::ReplyToInvite { reply, .. } => {
                Some(reply)
            }
            MessagePayload::Invitation(_) => None,
        }
    }

    /// The invitation, if this payload is one.
    pub fn as_invitation(&self) -> Option<&InvitationPayload> {
        match self {
            MessagePayload::Invitation(invite) => Some(invite),
            MessagePayload::Reply(_) | MessagePayload::ReplyToInvite { .. } => None,
        }
    }
}

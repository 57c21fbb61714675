//! Invitation payloads.

use serde::{Deserialize, Serialize};
use whispergrid_crypto::Jwk;

use crate::message_id::MessageId;

/// Payload of a `grid-invitation` token.
///
/// Invitations are signed but *not* encrypted: they are meant to be posted
/// in the open, so the note and nickname are plaintext by design. The
/// ephemeral public key is the inviter's half of the eventual thread
/// pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationPayload {
    /// Random id marking this invitation.
    pub message_id: MessageId,

    /// The inviter's ephemeral ECDH public key for this thread-to-be.
    pub epk: Jwk,

    /// Optional public note shown to anyone who sees the invitation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// The inviter's self-declared display name. Required.
    pub nickname: String,
}

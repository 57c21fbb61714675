//! Decrypted message views.

use whispergrid_crypto::Thumbprint;
use whispergrid_proto::{InvitationPayload, MessageId, ReplyPayload};

/// A message as a reader sees it after verification and decryption.
///
/// This is a *view*: the stored record stays the signed wire token, and a
/// view is recomputed from it on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// Identity thumbprint of the author.
    pub from: Thumbprint,

    /// Unix seconds the author signed the message.
    pub iat: u64,

    /// The author-sequence id of the message.
    pub message_id: MessageId,

    /// Readable text.
    pub message: String,

    /// The author's contiguous-received lower bound at send time, when
    /// one was embedded. Drives the display-order adjustment.
    pub min_ack: Option<MessageId>,
}

impl DecryptedMessage {
    /// View of a plaintext invitation.
    ///
    /// Invitations render as `Invite from {nickname}.` with the public
    /// note on a second line when one was attached.
    pub fn from_invitation(from: Thumbprint, iat: u64, payload: &InvitationPayload) -> Self {
        let message = match &payload.note {
            Some(note) => format!("Invite from {}.\nNote: {note}", payload.nickname),
            None => format!("Invite from {}.", payload.nickname),
        };
        DecryptedMessage { from, iat, message_id: payload.message_id, message, min_ack: None }
    }

    /// View of a decrypted thread reply.
    pub fn from_reply(from: Thumbprint, iat: u64, payload: &ReplyPayload) -> Self {
        DecryptedMessage {
            from,
            iat,
            message_id: payload.message_id,
            message: payload.message.clone(),
            min_ack: payload.min_ack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whispergrid_crypto::AgreementKeyPair;

    #[test]
    fn invitation_view_renders_nickname_and_note() {
        let payload = InvitationPayload {
            message_id: MessageId::new(1).unwrap(),
            epk: AgreementKeyPair::generate().public_jwk().unwrap(),
            note: Some("hi".to_string()),
            nickname: "Alice".to_string(),
        };
        let view =
            DecryptedMessage::from_invitation(Thumbprint::parse("id-a").unwrap(), 10, &payload);
        assert_eq!(view.message, "Invite from Alice.\nNote: hi");
    }

    #[test]
    fn invitation_view_without_note_is_single_line() {
        let payload = InvitationPayload {
            message_id: MessageId::new(1).unwrap(),
            epk: AgreementKeyPair::generate().public_jwk().unwrap(),
            note: None,
            nickname: "Alice".to_string(),
        };
        let view =
            DecryptedMessage::from_invitation(Thumbprint::parse("id-a").unwrap(), 10, &payload);
        assert_eq!(view.message, "Invite from Alice.");
    }
}

//! Token headers and subject tags.

use serde::{Deserialize, Serialize};
use whispergrid_crypto::{Jwk, Thumbprint};

/// Signature algorithm advertised by every token this crate signs.
pub const TOKEN_ALG: &str = "ES384";

/// What a token is, dispatched on by ingestion.
///
/// Every wire artifact carries exactly one subject. Parse sites match
/// exhaustively so a new subject cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    /// A publicly shareable, plaintext (but signed) invitation.
    #[serde(rename = "grid-invitation")]
    Invitation,

    /// Data encrypted by a party to itself via the storage key.
    #[serde(rename = "self-encrypted")]
    SelfEncrypted,

    /// An encrypted message within an established thread.
    #[serde(rename = "grid-reply")]
    Reply,

    /// The first message of a thread, doubling as handshake completion.
    #[serde(rename = "reply-to-invite")]
    ReplyToInvite,

    /// A full-state backup artifact.
    #[serde(rename = "grid-backup")]
    Backup,
}

impl Subject {
    /// The wire tag for this subject.
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Invitation => "grid-invitation",
            Subject::SelfEncrypted => "self-encrypted",
            Subject::Reply => "grid-reply",
            Subject::ReplyToInvite => "reply-to-invite",
            Subject::Backup => "grid-backup",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First segment of every token.
///
/// `iat` is stamped by the codec at signing time. The optional fields
/// depend on the subject:
///
/// - `jwk`: signer's public key (invitations, replies, self-encrypted)
/// - `epk`: ephemeral ECDH public key (self-encrypted, reply-to-invite)
/// - `iv`: AES-GCM IV when the payload segment is ciphertext
/// - `invite`: invitation thumbprint binding a reply-to-invite to the
///   invitation it answers; readable before decryption so the receiver can
///   locate the thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm, always `ES384`.
    pub alg: String,

    /// Unix seconds at signing time.
    pub iat: u64,

    /// Subject tag.
    pub sub: Subject,

    /// Signer's public key, when self-verification is intended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,

    /// Ephemeral ECDH public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epk: Option<Jwk>,

    /// Standard-base64 AES-GCM IV for encrypted payload segments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    /// Invitation thumbprint, present only on reply-to-invite tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite: Option<Thumbprint>,
}

impl TokenHeader {
    /// A bare header for the given subject; `iat` is filled in at signing.
    pub fn new(sub: Subject) -> TokenHeader {
        TokenHeader {
            alg: TOKEN_ALG.to_string(),
            iat: 0,
            sub,
            jwk: None,
            epk: None,
            iv: None,
            invite: None,
        }
    }

    /// Attach the signer's public key.
    pub fn with_jwk(mut self, jwk: Jwk) -> TokenHeader {
        self.jwk = Some(jwk);
        self
    }

    /// Attach an ephemeral public key.
    pub fn with_epk(mut self, epk: Jwk) -> TokenHeader {
        self.epk = Some(epk);
        self
    }

    /// Attach an encrypted-payload IV.
    pub fn with_iv(mut self, iv: String) -> TokenHeader {
        self.iv = Some(iv);
        self
    }

    /// Attach the answered invitation's thumbprint.
    pub fn with_invite(mut self, invite: Thumbprint) -> TokenHeader {
        self.invite = Some(invite);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_tags_roundtrip() {
        for sub in [
            Subject::Invitation,
            Subject::SelfEncrypted,
            Subject::Reply,
            Subject::ReplyToInvite,
            Subject::Backup,
        ] {
            let json = serde_json::to_string(&sub).unwrap();
            assert_eq!(json, format!("\"{}\"", sub.as_str()));
            assert_eq!(serde_json::from_str::<Subject>(&json).unwrap(), sub);
        }
    }

    #[test]
    fn optional_fields_are_omitted() {
        let header = TokenHeader::new(Subject::Invitation);
        let json = serde_json::to_string(&header).unwrap();
        assert!(!json.contains("jwk"));
        assert!(!json.contains("epk"));
        assert!(!json.contains("iv"));
        assert!(!json.contains("invite"));
    }
}

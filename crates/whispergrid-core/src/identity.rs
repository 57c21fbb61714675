//! Identity and thread-key management.
//!
//! An [`Identity`] owns two key pairs:
//!
//! - the ECDSA *identity* key, which signs everything this party
//!   originates, and
//! - a separate ECDH *storage* key used exclusively to self-encrypt data
//!   at rest (a local KEK).
//!
//! Both private halves persist only password-wrapped inside a
//! [`StoredIdentity`] record. Ephemeral per-thread ECDH keys are generated
//! here and immediately persisted self-encrypted: a one-shot
//! Diffie-Hellman to our own storage key wraps the thread key so it can
//! sit in ordinary storage without a second at-rest encryption layer.
//!
//! # Invariants
//!
//! - An identity is immutable once created; loading always requires the
//!   password that wrapped it.
//! - A wrong password is a generic [`CryptoError::Decryption`], not a
//!   distinguishable "wrong password", intentionally useless as an
//!   oracle.
//! - Thread private keys never exist in plaintext outside
//!   [`Identity::encrypt_to_self`] round-trips.

use thiserror::Error;
use tracing::debug;
use whispergrid_crypto::{
    AgreementKeyPair, CryptoError, Jwk, SigningKeyPair, Thumbprint, decrypt_payload,
    encrypt_payload, unwrap_private_key, wrap_private_key,
};
use whispergrid_proto::{Body, SignedToken, Subject, TokenError, TokenHeader};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::storage::{Storage, StorageError, StorageKey};

/// Errors from identity and thread-key management.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// An underlying cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A token could not be built, parsed or verified.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Storage access failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No self-encrypted thread key is stored under this thumbprint.
    #[error("thread key {0} not found")]
    ThreadKeyNotFound(Thumbprint),

    /// A self-encrypted token lacked a required header field.
    #[error("self-encrypted token is missing {0}")]
    MissingField(&'static str),

    /// A token of the wrong subject reached an identity operation.
    #[error("unexpected token subject: {0}")]
    UnexpectedSubject(Subject),
}

/// The persisted identity record, keyed by identity thumbprint.
///
/// Public halves are stored in the clear; private halves only
/// password-wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    /// Thumbprint of the identity (signing) key.
    pub thumbprint: Thumbprint,

    /// Public identity key.
    pub signing_public: Jwk,

    /// Public storage key.
    pub storage_public: Jwk,

    /// Password-wrapped private identity key.
    pub wrapped_signing_key: String,

    /// Password-wrapped private storage key.
    pub wrapped_storage_key: String,
}

/// A loaded (unlocked) identity.
#[derive(Debug)]
pub struct Identity {
    signing: SigningKeyPair,
    storage_key: AgreementKeyPair,
}

impl Identity {
    /// Create a brand-new identity, returning it unlocked together with
    /// its persistable record.
    pub fn generate(password: &str) -> Result<(Identity, StoredIdentity), IdentityError> {
        let identity =
            Identity { signing: SigningKeyPair::generate(), storage_key: AgreementKeyPair::generate() };
        let record = identity.to_stored(password)?;
        debug!(thumbprint = %record.thumbprint, "generated identity");
        Ok((identity, record))
    }

    /// Unlock a stored identity.
    ///
    /// # Errors
    ///
    /// A wrong password surfaces as `CryptoError::Decryption`, identical
    /// to corrupted key material.
    pub fn load(record: &StoredIdentity, password: &str) -> Result<Identity, IdentityError> {
        let signing_jwk = unwrap_private_key(&record.wrapped_signing_key, password)?;
        let storage_jwk = unwrap_private_key(&record.wrapped_storage_key, password)?;
        Ok(Identity {
            signing: SigningKeyPair::from_jwk(&signing_jwk)?,
            storage_key: AgreementKeyPair::from_jwk(&storage_jwk)?,
        })
    }

    /// Re-wrap this identity under a password (used at creation and for
    /// backups).
    pub fn to_stored(&self, password: &str) -> Result<StoredIdentity, IdentityError> {
        Ok(StoredIdentity {
            thumbprint: self.thumbprint()?,
            signing_public: self.signing.public_jwk()?,
            storage_public: self.storage_key.public_jwk()?,
            wrapped_signing_key: wrap_private_key(&self.signing.private_jwk()?, password)?,
            wrapped_storage_key: wrap_private_key(&self.storage_key.private_jwk()?, password)?,
        })
    }

    /// Thumbprint of the identity key, this party's external identifier.
    pub fn thumbprint(&self) -> Result<Thumbprint, IdentityError> {
        Ok(self.signing.thumbprint()?)
    }

    /// The identity signing key.
    pub fn signing(&self) -> &SigningKeyPair {
        &self.signing
    }

    /// Public half of the identity key.
    pub fn signing_public_jwk(&self) -> Result<Jwk, IdentityError> {
        Ok(self.signing.public_jwk()?)
    }

    /// Encrypt a message to ourselves via the storage key.
    ///
    /// A fresh single-use ephemeral ECDH pair derives a secret with our
    /// own storage public key; the ephemeral public half rides in the
    /// token header so the secret can be re-derived at read time. The
    /// token is signed by the identity key.
    pub fn encrypt_to_self(&self, message: &str) -> Result<SignedToken, IdentityError> {
        let ephemeral = AgreementKeyPair::generate();
        let secret = ephemeral.derive_shared_secret(&self.storage_key.public_jwk()?)?;
        let encrypted = encrypt_payload(&secret, message)?;

        let header = TokenHeader::new(Subject::SelfEncrypted)
            .with_jwk(self.signing.public_jwk()?)
            .with_epk(ephemeral.public_jwk()?)
            .with_iv(encrypted.iv);
        Ok(SignedToken::sign(header, &Body::Text(encrypted.ciphertext), &self.signing)?)
    }

    /// Decrypt a token produced by [`Identity::encrypt_to_self`].
    ///
    /// Verifies the signature against our own identity key (no embedded
    /// key is trusted), then re-derives the secret from the storage
    /// private key and the embedded ephemeral public key.
    pub fn decrypt_from_self(&self, token: &SignedToken) -> Result<String, IdentityError> {
        if token.header().sub != Subject::SelfEncrypted {
            return Err(IdentityError::UnexpectedSubject(token.header().sub));
        }
        token.verify(Some(&self.signing.public_jwk()?))?;

        let epk = token.header().epk.as_ref().ok_or(IdentityError::MissingField("epk"))?;
        let iv = token.header().iv.as_ref().ok_or(IdentityError::MissingField("iv"))?;

        let secret = self.storage_key.derive_shared_secret(epk)?;
        Ok(decrypt_payload(&secret, iv, token.payload_text())?)
    }

    /// Generate an ephemeral thread key and persist it self-encrypted
    /// under its own thumbprint.
    pub fn make_thread_key<S: Storage>(
        &self,
        storage: &S,
    ) -> Result<(Thumbprint, AgreementKeyPair), IdentityError> {
        let pair = AgreementKeyPair::generate();
        let thumbprint = pair.thumbprint()?;

        let private = Zeroizing::new(pair.private_jwk()?.to_json()?);
        let token = self.encrypt_to_self(&private)?;
        storage.set(&StorageKey::EncryptedThreadKey(thumbprint.clone()), token.as_str().to_string())?;

        debug!(thumbprint = %thumbprint, "created thread key");
        Ok((thumbprint, pair))
    }

    /// Load a previously persisted thread key.
    pub fn thread_key<S: Storage>(
        &self,
        storage: &S,
        thumbprint: &Thumbprint,
    ) -> Result<AgreementKeyPair, IdentityError> {
        let stored = storage
            .get(&StorageKey::EncryptedThreadKey(thumbprint.clone()))?
            .ok_or_else(|| IdentityError::ThreadKeyNotFound(thumbprint.clone()))?;

        let token = SignedToken::parse(&stored)?;
        let private = Zeroizing::new(self.decrypt_from_self(&token)?);
        Ok(AgreementKeyPair::from_jwk(&Jwk::from_json(&private)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn generate_load_roundtrip() {
        let (identity, record) = Identity::generate("correct horse").unwrap();
        let loaded = Identity::load(&record, "correct horse").unwrap();

        assert_eq!(identity.thumbprint().unwrap(), loaded.thumbprint().unwrap());
        assert_eq!(record.thumbprint, identity.thumbprint().unwrap());
    }

    #[test]
    fn wrong_password_is_opaque() {
        let (_, record) = Identity::generate("p1").unwrap();
        let err = Identity::load(&record, "p2").unwrap_err();
        assert_eq!(err, IdentityError::Crypto(CryptoError::Decryption));
    }

    #[test]
    fn stored_record_never_contains_private_scalars() {
        let (_, record) = Identity::generate("pw").unwrap();
        assert!(!record.signing_public.is_private());
        assert!(!record.storage_public.is_private());

        let json = serde_json::to_string(&record).unwrap();
        // Wrapped keys are three base64 segments, not JWK JSON.
        assert!(!json.contains("\"d\":"));
    }

    #[test]
    fn encrypt_to_self_roundtrip() {
        let (identity, _) = Identity::generate("pw").unwrap();
        let token = identity.encrypt_to_self("thread key material").unwrap();

        assert_eq!(token.header().sub, Subject::SelfEncrypted);
        assert_eq!(identity.decrypt_from_self(&token).unwrap(), "thread key material");
    }

    #[test]
    fn decrypt_from_self_rejects_foreign_tokens() {
        let (alice, _) = Identity::generate("pw").unwrap();
        let (mallory, _) = Identity::generate("pw").unwrap();

        let token = mallory.encrypt_to_self("not yours").unwrap();
        assert!(alice.decrypt_from_self(&token).is_err());
    }

    #[test]
    fn ephemeral_key_is_fresh_per_encryption() {
        let (identity, _) = Identity::generate("pw").unwrap();
        let a = identity.encrypt_to_self("same message").unwrap();
        let b = identity.encrypt_to_self("same message").unwrap();
        assert_ne!(a.header().epk, b.header().epk);
    }

    #[test]
    fn thread_key_persists_self_encrypted() {
        let storage = MemoryStorage::new();
        let (identity, _) = Identity::generate("pw").unwrap();

        let (thumbprint, pair) = identity.make_thread_key(&storage).unwrap();
        assert!(storage.has(&StorageKey::EncryptedThreadKey(thumbprint.clone())).unwrap());

        let restored = identity.thread_key(&storage, &thumbprint).unwrap();
        assert_eq!(restored.thumbprint().unwrap(), pair.thumbprint().unwrap());
    }

    #[test]
    fn missing_thread_key_is_reported() {
        let storage = MemoryStorage::new();
        let (identity, _) = Identity::generate("pw").unwrap();
        let absent = Thumbprint::parse("id-absent").unwrap();

        assert_eq!(
            identity.thread_key(&storage, &absent).unwrap_err(),
            IdentityError::ThreadKeyNotFound(absent)
        );
    }
}

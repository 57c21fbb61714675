//! P-384 key pairs and ECDH agreement.
//!
//! Two key roles exist and are kept as distinct types on purpose:
//!
//! - [`SigningKeyPair`]: long-term ECDSA identity key, signs every token a
//!   party originates (SHA-384 digests, raw `r || s` signatures).
//! - [`AgreementKeyPair`]: ECDH key used for per-thread shared secrets and
//!   for the self-encryption storage key.
//!
//! # Security
//!
//! - Shared secrets are the first 256 bits of the ECDH x-coordinate,
//!   imported directly as an AES-256-GCM key. The derivation is symmetric:
//!   either side of a pairing computes the identical secret.
//! - Secret scalars live inside `p384::SecretKey`, which zeroizes on drop.
//!   [`SharedSecret`] zeroizes its key bytes on drop as well.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p384::{
    EncodedPoint, FieldBytes, PublicKey, SecretKey,
    ecdsa::{
        Signature, SigningKey, VerifyingKey,
        signature::{Signer as _, Verifier as _},
    },
    elliptic_curve::sec1::{FromEncodedPoint as _, ToEncodedPoint as _},
};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    jwk::{Jwk, Thumbprint},
};

/// Curve name advertised in every JWK this crate produces.
const CURVE: &str = "P-384";

/// Key type advertised in every JWK this crate produces.
const KEY_TYPE: &str = "EC";

fn decode_coordinate(encoded: &str) -> Result<FieldBytes, CryptoError> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded)?;
    if bytes.len() != 48 {
        return Err(CryptoError::InvalidKey(format!(
            "coordinate must be 48 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(FieldBytes::clone_from_slice(&bytes))
}

fn check_curve(jwk: &Jwk) -> Result<(), CryptoError> {
    if jwk.kty != KEY_TYPE || jwk.crv != CURVE {
        return Err(CryptoError::InvalidKey(format!(
            "expected {KEY_TYPE}/{CURVE} key, got {}/{}",
            jwk.kty, jwk.crv
        )));
    }
    Ok(())
}

/// Import a public P-384 point from a JWK.
pub(crate) fn public_from_jwk(jwk: &Jwk) -> Result<PublicKey, CryptoError> {
    check_curve(jwk)?;
    let x = decode_coordinate(&jwk.x)?;
    let y = decode_coordinate(&jwk.y)?;
    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::<PublicKey>::from(PublicKey::from_encoded_point(&point))
        .ok_or_else(|| CryptoError::InvalidKey("point is not on the P-384 curve".to_string()))
}

fn secret_from_jwk(jwk: &Jwk) -> Result<SecretKey, CryptoError> {
    check_curve(jwk)?;
    let d = jwk
        .d
        .as_deref()
        .ok_or_else(|| CryptoError::InvalidKey("JWK has no private scalar".to_string()))?;
    let mut bytes = URL_SAFE_NO_PAD.decode(d)?;
    let secret = SecretKey::from_slice(&bytes)
        .map_err(|_| CryptoError::InvalidKey("invalid private scalar".to_string()));
    bytes.zeroize();
    secret
}

fn public_coordinates(public: &PublicKey) -> Result<(String, String), CryptoError> {
    let point = public.to_encoded_point(false);
    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(CryptoError::InvalidKey("public key is the point at infinity".to_string()));
    };
    Ok((URL_SAFE_NO_PAD.encode(x), URL_SAFE_NO_PAD.encode(y)))
}

fn jwk_for(
    secret: &SecretKey,
    include_private: bool,
    alg: Option<&str>,
    key_ops: &[&str],
) -> Result<Jwk, CryptoError> {
    let (x, y) = public_coordinates(&secret.public_key())?;
    Ok(Jwk {
        kty: KEY_TYPE.to_string(),
        crv: CURVE.to_string(),
        x,
        y,
        d: include_private.then(|| URL_SAFE_NO_PAD.encode(secret.to_bytes())),
        alg: alg.map(str::to_string),
        key_ops: (!key_ops.is_empty())
            .then(|| key_ops.iter().map(|op| (*op).to_string()).collect()),
        ext: Some(true),
    })
}

/// Long-term ECDSA P-384 signing key pair.
#[derive(Debug)]
pub struct SigningKeyPair {
    secret: SecretKey,
}

impl SigningKeyPair {
    /// Generate a fresh signing key pair from the platform RNG.
    pub fn generate() -> SigningKeyPair {
        SigningKeyPair { secret: SecretKey::random(&mut OsRng) }
    }

    /// Import a signing key pair from a private JWK.
    pub fn from_jwk(jwk: &Jwk) -> Result<SigningKeyPair, CryptoError> {
        Ok(SigningKeyPair { secret: secret_from_jwk(jwk)? })
    }

    /// Public half as a JWK (`alg: ES384`).
    pub fn public_jwk(&self) -> Result<Jwk, CryptoError> {
        jwk_for(&self.secret, false, Some("ES384"), &["verify"])
    }

    /// Private half as a JWK. Handle with care; callers wrap this before
    /// persisting.
    pub fn private_jwk(&self) -> Result<Jwk, CryptoError> {
        jwk_for(&self.secret, true, Some("ES384"), &["sign"])
    }

    /// Thumbprint of the public half.
    pub fn thumbprint(&self) -> Result<Thumbprint, CryptoError> {
        Ok(self.public_jwk()?.thumbprint())
    }

    /// Sign a message with ECDSA/SHA-384. Returns the raw 96-byte
    /// `r || s` signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signer = SigningKey::from(&self.secret);
        let signature: Signature = signer.sign(message);
        signature.to_bytes().to_vec()
    }
}

/// Verify a raw `r || s` ECDSA/SHA-384 signature against a public JWK.
///
/// This is the cryptographic check only. It implies nothing about *whose*
/// key signed; callers bind the key to an identity by comparing thumbprints
/// separately.
///
/// # Errors
///
/// - `InvalidKey` if the JWK cannot be imported
/// - `SignatureVerification` if the signature does not match
pub fn verify_signature(jwk: &Jwk, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let public = public_from_jwk(jwk)?;
    let verifier = VerifyingKey::from(&public);
    let signature =
        Signature::from_slice(signature).map_err(|_| CryptoError::SignatureVerification)?;
    verifier.verify(message, &signature).map_err(|_| CryptoError::SignatureVerification)
}

/// ECDH P-384 key agreement pair.
///
/// Used for thread keys (one per conversation) and the at-rest storage key.
#[derive(Debug)]
pub struct AgreementKeyPair {
    secret: SecretKey,
}

impl AgreementKeyPair {
    /// Generate a fresh agreement key pair from the platform RNG.
    pub fn generate() -> AgreementKeyPair {
        AgreementKeyPair { secret: SecretKey::random(&mut OsRng) }
    }

    /// Import an agreement key pair from a private JWK.
    pub fn from_jwk(jwk: &Jwk) -> Result<AgreementKeyPair, CryptoError> {
        Ok(AgreementKeyPair { secret: secret_from_jwk(jwk)? })
    }

    /// Public half as a JWK.
    pub fn public_jwk(&self) -> Result<Jwk, CryptoError> {
        jwk_for(&self.secret, false, None, &[])
    }

    /// Private half as a JWK.
    pub fn private_jwk(&self) -> Result<Jwk, CryptoError> {
        jwk_for(&self.secret, true, None, &["deriveKey", "deriveBits"])
    }

    /// Thumbprint of the public half.
    pub fn thumbprint(&self) -> Result<Thumbprint, CryptoError> {
        Ok(self.public_jwk()?.thumbprint())
    }

    /// Derive the symmetric secret shared with a peer's public key.
    ///
    /// ECDH over P-384, truncated to the first 256 bits of the
    /// x-coordinate. Symmetric: `a.derive(b.pub) == b.derive(a.pub)`.
    pub fn derive_shared_secret(&self, peer: &Jwk) -> Result<SharedSecret, CryptoError> {
        let public = public_from_jwk(peer)?;
        let shared =
            p384::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), public.as_affine());
        let raw = shared.raw_secret_bytes();
        let mut key = [0u8; 32];
        key.copy_from_slice(&raw[..32]);
        Ok(SharedSecret { key })
    }
}

/// 256-bit symmetric secret produced by ECDH agreement.
///
/// Functions directly as an AES-256-GCM key. Zeroized on drop.
pub struct SharedSecret {
    key: [u8; 32],
}

impl SharedSecret {
    /// The raw AES-256-GCM key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Construct a secret from raw bytes (test vectors, storage import).
    pub fn from_bytes(key: [u8; 32]) -> SharedSecret {
        SharedSecret { key }
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let pair = SigningKeyPair::generate();
        let public = pair.public_jwk().unwrap();
        let signature = pair.sign(b"token body");

        verify_signature(&public, b"token body", &signature).unwrap();
    }

    #[test]
    fn tampered_message_fails_verification() {
        let pair = SigningKeyPair::generate();
        let public = pair.public_jwk().unwrap();
        let signature = pair.sign(b"token body");

        let err = verify_signature(&public, b"token bodY", &signature).unwrap_err();
        assert_eq!(err, CryptoError::SignatureVerification);
    }

    #[test]
    fn wrong_key_fails_verification() {
        let pair = SigningKeyPair::generate();
        let other = SigningKeyPair::generate();
        let signature = pair.sign(b"token body");

        assert!(verify_signature(&other.public_jwk().unwrap(), b"token body", &signature).is_err());
    }

    #[test]
    fn signing_jwk_roundtrip_preserves_identity() {
        let pair = SigningKeyPair::generate();
        let restored = SigningKeyPair::from_jwk(&pair.private_jwk().unwrap()).unwrap();

        assert_eq!(pair.thumbprint().unwrap(), restored.thumbprint().unwrap());

        // A signature from the restored key verifies under the original
        // public key.
        let signature = restored.sign(b"hello");
        verify_signature(&pair.public_jwk().unwrap(), b"hello", &signature).unwrap();
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();

        let ab = alice.derive_shared_secret(&bob.public_jwk().unwrap()).unwrap();
        let ba = bob.derive_shared_secret(&alice.public_jwk().unwrap()).unwrap();

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn different_pairings_produce_different_secrets() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let carol = AgreementKeyPair::generate();

        let ab = alice.derive_shared_secret(&bob.public_jwk().unwrap()).unwrap();
        let ac = alice.derive_shared_secret(&carol.public_jwk().unwrap()).unwrap();

        assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn public_jwk_has_no_private_scalar() {
        let pair = AgreementKeyPair::generate();
        assert!(!pair.public_jwk().unwrap().is_private());
        assert!(pair.private_jwk().unwrap().is_private());
    }

    #[test]
    fn rejects_wrong_curve() {
        let mut jwk = SigningKeyPair::generate().public_jwk().unwrap();
        jwk.crv = "P-256".to_string();
        assert!(public_from_jwk(&jwk).is_err());
    }
}

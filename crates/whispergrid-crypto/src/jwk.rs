//! JSON Web Key representation and thumbprints.
//!
//! Keys cross the wire as JWKs (`kty`/`crv`/`x`/`y`, plus `d` for private
//! halves). A [`Thumbprint`] is the stable external identifier derived from
//! a JWK: SHA-256 over a canonical JSON of the curve point, base64url
//! encoded, prefixed `id-`.
//!
//! # Invariants
//!
//! - Thumbprints depend only on `crv`, `kty`, `x` and `y`. Usage metadata
//!   (`alg`, `key_ops`, `ext`) never changes a key's identity.
//! - The canonical object uses the key name `crf` (not `crv`). This is a
//!   historical artifact of the original deployment and is load-bearing:
//!   every previously issued thumbprint was computed over `crf`, so the
//!   name must never be corrected.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// A JSON Web Key for a P-384 curve point.
///
/// Public keys carry `x`/`y`; private keys additionally carry `d`. The
/// optional metadata fields round-trip untouched but are ignored by
/// [`Thumbprint::of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type, always `EC` for this protocol.
    pub kty: String,

    /// Curve name, always `P-384`.
    pub crv: String,

    /// Base64url-encoded x coordinate (48 bytes).
    pub x: String,

    /// Base64url-encoded y coordinate (48 bytes).
    pub y: String,

    /// Base64url-encoded private scalar, present only for private keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// Advertised algorithm (e.g. `ES384`). Not part of the key identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Advertised key operations. Not part of the key identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,

    /// Extractability flag. Not part of the key identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,
}

impl Jwk {
    /// Whether this JWK carries a private scalar.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Copy of this JWK with the private scalar removed.
    pub fn to_public(&self) -> Jwk {
        Jwk { d: None, ..self.clone() }
    }

    /// Parse a JWK from its JSON text form.
    pub fn from_json(text: &str) -> Result<Self, CryptoError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize this JWK to JSON text.
    pub fn to_json(&self) -> Result<String, CryptoError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Thumbprint of this key.
    pub fn thumbprint(&self) -> Thumbprint {
        Thumbprint::of(self)
    }
}

/// Stable identifier for a key: `id-{base64url(sha256(canonical_jwk))}`.
///
/// Used as the primary external identifier for identities and as the lookup
/// key for thread keys and thread records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Prefix carried by every thumbprint string.
    pub const PREFIX: &'static str = "id-";

    /// Compute the thumbprint of a JWK.
    ///
    /// Deterministic: hashes only the canonical curve-point fields, so two
    /// JWKs differing in `alg` or `key_ops` (or in private material)
    /// thumbprint identically.
    pub fn of(jwk: &Jwk) -> Thumbprint {
        // The `crf` key name is intentional; see the module docs. Field
        // order is alphabetical, which serde_json's map ordering matches.
        let canonical = serde_json::json!({
            "crf": jwk.crv,
            "kty": jwk.kty,
            "x": jwk.x,
            "y": jwk.y,
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Thumbprint(format!("{}{}", Self::PREFIX, URL_SAFE_NO_PAD.encode(digest)))
    }

    /// Wrap an already-formatted thumbprint string.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Malformed` if the string lacks the `id-`
    /// prefix.
    pub fn parse(text: &str) -> Result<Thumbprint, CryptoError> {
        if !text.starts_with(Self::PREFIX) {
            return Err(CryptoError::Malformed(format!("not a thumbprint: {text}")));
        }
        Ok(Thumbprint(text.to_string()))
    }

    /// The thumbprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

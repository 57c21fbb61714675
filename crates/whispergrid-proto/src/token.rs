//! The compact signed token codec.
//!
//! Every wire artifact is ASCII text of the form
//! `base64url(header).base64url(payload).base64url(hex(signature))`: no
//! padding, no embedded whitespace. The signature is ECDSA P-384/SHA-384
//! over the UTF-8 bytes of `base64url(header).base64url(payload)`, and
//! travels hex-encoded inside the third segment (a quirk of the original
//! deployment that is now load-bearing).
//!
//! # Security
//!
//! [`SignedToken::verify`] is the *cryptographic* check only. When no
//! explicit key is supplied it self-verifies against the embedded
//! `header.jwk`, which proves nothing about who signed. Callers must bind
//! the embedded key to an expected identity by thumbprint before trusting
//! the content. The two steps are never conflated here.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Serialize, de::DeserializeOwned};
use whispergrid_crypto::{Jwk, SigningKeyPair, verify_signature};

use crate::{
    errors::{Result, TokenError},
    header::TokenHeader,
};

/// Decoded payload segment.
///
/// Payloads are either JSON (invitations, backups) or an opaque string
/// (already-encrypted blobs). Parsing tries JSON first and falls back to
/// the raw string, mirroring what every deployed reader does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Payload parsed as JSON.
    Json(serde_json::Value),
    /// Payload kept as an opaque string.
    Text(String),
}

impl Body {
    /// Build a JSON body from any serializable value.
    pub fn from_value<T: Serialize>(value: &T) -> Result<Body> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    /// Deserialize a JSON body into a typed payload.
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Body::Json(value) => Ok(serde_json::from_value(value.clone())?),
            Body::Text(text) => Ok(serde_json::from_str(text)?),
        }
    }

    fn encode(&self) -> Result<String> {
        match self {
            Body::Json(value) => Ok(serde_json::to_string(value)?),
            Body::Text(text) => Ok(text.clone()),
        }
    }

    fn decode(text: String) -> Body {
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Text(text),
        }
    }
}

/// A parsed (or freshly signed) three-segment token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    header: TokenHeader,
    body: Body,
    payload_text: String,
    signature: Vec<u8>,
    raw: String,
}

impl SignedToken {
    /// Sign a header and payload into a token.
    ///
    /// Stamps `header.iat` with the current unix time before encoding.
    pub fn sign(mut header: TokenHeader, body: &Body, key: &SigningKeyPair) -> Result<SignedToken> {
        header.iat = unix_now();
        Self::sign_at(header, body, key)
    }

    /// Sign with whatever `iat` the header already carries.
    ///
    /// Exists so tests and replays can produce deterministic timestamps;
    /// production paths go through [`SignedToken::sign`].
    pub fn sign_at(header: TokenHeader, body: &Body, key: &SigningKeyPair) -> Result<SignedToken> {
        let header_json = serde_json::to_string(&header)?;
        let payload_text = body.encode()?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&header_json),
            URL_SAFE_NO_PAD.encode(&payload_text)
        );

        let signature = key.sign(signing_input.as_bytes());
        let raw = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(hex::encode(&signature)));

        Ok(SignedToken { header, body: body.clone(), payload_text, signature, raw })
    }

    /// Parse token text into its segments.
    ///
    /// Tolerates a single extra pair of wrapping quote characters
    /// (defensive against double-serialization upstream). Performs no
    /// signature check; see [`SignedToken::verify`].
    pub fn parse(text: &str) -> Result<SignedToken> {
        let mut trimmed = text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            trimmed = &trimmed[1..trimmed.len() - 1];
        }

        let segments: Vec<&str> = trimmed.split('.').collect();
        let [header_seg, payload_seg, signature_seg] = segments.as_slice() else {
            return Err(TokenError::Malformed(format!(
                "expected 3 segments, got {}",
                segments.len()
            )));
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_seg)
            .map_err(|e| TokenError::Malformed(format!("header segment: {e}")))?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| TokenError::Malformed(format!("header JSON: {e}")))?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_seg)
            .map_err(|e| TokenError::Malformed(format!("payload segment: {e}")))?;
        let payload_text = String::from_utf8(payload_bytes)
            .map_err(|_| TokenError::Malformed("payload is not UTF-8".to_string()))?;

        let signature_hex = URL_SAFE_NO_PAD
            .decode(signature_seg)
            .map_err(|e| TokenError::Malformed(format!("signature segment: {e}")))?;
        let signature_hex = String::from_utf8(signature_hex)
            .map_err(|_| TokenError::Malformed("signature hex is not UTF-8".to_string()))?;
        let signature = hex::decode(signature_hex)
            .map_err(|e| TokenError::Malformed(format!("signature hex: {e}")))?;

        Ok(SignedToken {
            header,
            body: Body::decode(payload_text.clone()),
            payload_text,
            signature,
            raw: trimmed.to_string(),
        })
    }

    /// Verify the ECDSA signature.
    ///
    /// With `Some(key)` the supplied key is authoritative. With `None` the
    /// token self-verifies against its embedded `header.jwk`; an absent or
    /// unusable embedded key is the same [`TokenError::InvalidSignature`]
    /// as a failed check.
    pub fn verify(&self, key: Option<&Jwk>) -> Result<()> {
        let jwk = match key {
            Some(jwk) => jwk,
            None => self.header.jwk.as_ref().ok_or(TokenError::InvalidSignature)?,
        };
        verify_signature(jwk, self.signing_input().as_bytes(), &self.signature)
            .map_err(|_| TokenError::InvalidSignature)
    }

    /// Token header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Decoded payload.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The decoded payload segment as text (ciphertext blobs live here).
    pub fn payload_text(&self) -> &str {
        &self.payload_text
    }

    /// The full wire text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The signed portion: `base64url(header).base64url(payload)`.
    fn signing_input(&self) -> &str {
        match self.raw.rfind('.') {
            Some(index) => &self.raw[..index],
            None => &self.raw,
        }
    }
}

impl std::fmt::Display for SignedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

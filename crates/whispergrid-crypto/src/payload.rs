//! Symmetric payload encryption.
//!
//! Message bodies travel AES-256-GCM encrypted under the thread's shared
//! secret. Plaintext is wrapped as `{"m": ...}` before encryption; short
//! bodies are padded with a `random` field of hex noise so that every
//! ciphertext covers at least [`MIN_PLAINTEXT_LEN`] bytes of plaintext,
//! blunting length-based traffic analysis on one-word messages.
//!
//! Wire encoding is asymmetric by historical accident and must stay so:
//! the IV is standard base64, the ciphertext is base64url without padding.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead as _, KeyInit as _},
};
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use rand::RngCore as _;
use serde::{Deserialize, Serialize};

use crate::{error::CryptoError, keys::SharedSecret};

/// Minimum serialized plaintext length before encryption.
pub const MIN_PLAINTEXT_LEN: usize = 30;

/// AES-GCM IV length in bytes.
pub const IV_LEN: usize = 12;

/// An encrypted payload ready for embedding in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Standard-base64 12-byte IV.
    pub iv: String,
    /// Base64url (no padding) AES-256-GCM ciphertext.
    pub ciphertext: String,
}

/// Encrypt a plaintext string under a shared secret.
///
/// The plaintext is wrapped as `{"m": plaintext}`; if that serialization is
/// under [`MIN_PLAINTEXT_LEN`] bytes a `random` hex field pads it past the
/// minimum. A fresh random IV is drawn per call.
pub fn encrypt_payload(
    secret: &SharedSecret,
    plaintext: &str,
) -> Result<EncryptedPayload, CryptoError> {
    let mut body = serde_json::json!({ "m": plaintext }).to_string();
    if body.len() < MIN_PLAINTEXT_LEN {
        // Two hex characters per random byte; round up so the padded form
        // always reaches the minimum.
        let deficit = MIN_PLAINTEXT_LEN - body.len();
        let mut noise = vec![0u8; deficit.div_ceil(2)];
        rand::rngs::OsRng.fill_bytes(&mut noise);
        body = serde_json::json!({ "m": plaintext, "random": hex::encode(noise) }).to_string();
    }

    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret.as_bytes()));
    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&iv), body.as_bytes()) else {
        unreachable!("AES-256-GCM encryption cannot fail with valid inputs");
    };

    Ok(EncryptedPayload { iv: STANDARD.encode(iv), ciphertext: URL_SAFE_NO_PAD.encode(ciphertext) })
}

/// Decrypt a payload produced by [`encrypt_payload`].
///
/// Returns the inner `m` field when the decrypted JSON carries one,
/// otherwise the raw decrypted text (tokens from older writers stored bare
/// strings).
///
/// # Errors
///
/// `CryptoError::Decryption` on tag failure (wrong secret or tampering);
/// no further detail is exposed.
pub fn decrypt_payload(
    secret: &SharedSecret,
    iv: &str,
    ciphertext: &str,
) -> Result<String, CryptoError> {
    let iv = STANDARD.decode(iv)?;
    if iv.len() != IV_LEN {
        return Err(CryptoError::Malformed(format!("IV must be {IV_LEN} bytes, got {}", iv.len())));
    }
    let ciphertext = URL_SAFE_NO_PAD.decode(ciphertext)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret.as_bytes()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map_err(|_| CryptoError::Decryption)?;
    let text = String::from_utf8(plaintext)
        .map_err(|_| CryptoError::Malformed("decrypted payload is not UTF-8".to_string()))?;

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(serde_json::Value::Object(map)) => match map.get("m") {
            Some(serde_json::Value::String(message)) => Ok(message.clone()),
            _ => Ok(text),
        },
        _ => Ok(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SharedSecret {
        SharedSecret::from_bytes([7u8; 32])
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let encrypted = encrypt_payload(&secret(), "hello").unwrap();
        let decrypted = decrypt_payload(&secret(), &encrypted.iv, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, "hello");
    }

    #[test]
    fn long_message_roundtrip() {
        let message = "a".repeat(4096);
        let encrypted = encrypt_payload(&secret(), &message).unwrap();
        let decrypted = decrypt_payload(&secret(), &encrypted.iv, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, message);
    }

    #[test]
    fn short_messages_are_padded() {
        // "hi" serializes to {"m":"hi"} = 10 bytes; padded form must cover
        // at least MIN_PLAINTEXT_LEN bytes of plaintext plus the GCM tag.
        let encrypted = encrypt_payload(&secret(), "hi").unwrap();
        let ciphertext = URL_SAFE_NO_PAD.decode(&encrypted.ciphertext).unwrap();
        assert!(ciphertext.len() >= MIN_PLAINTEXT_LEN + 16);
    }

    #[test]
    fn padding_survives_roundtrip() {
        let encrypted = encrypt_payload(&secret(), "x").unwrap();
        let decrypted = decrypt_payload(&secret(), &encrypted.iv, &encrypted.ciphertext).unwrap();
        assert_eq!(decrypted, "x");
    }

    #[test]
    fn wrong_secret_fails_opaquely() {
        let encrypted = encrypt_payload(&secret(), "hello").unwrap();
        let other = SharedSecret::from_bytes([8u8; 32]);
        let err = decrypt_payload(&other, &encrypted.iv, &encrypted.ciphertext).unwrap_err();
        assert_eq!(err, CryptoError::Decryption);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let encrypted = encrypt_payload(&secret(), "hello").unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(&encrypted.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);
        assert!(decrypt_payload(&secret(), &encrypted.iv, &tampered).is_err());
    }

    #[test]
    fn iv_is_fresh_per_call() {
        let a = encrypt_payload(&secret(), "hello").unwrap();
        let b = encrypt_payload(&secret(), "hello").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}

//! Password-based private key wrapping.
//!
//! Private JWKs are persisted only in wrapped form:
//! PBKDF2-HMAC-SHA256 (100 000 iterations, random 16-byte salt) derives an
//! AES-256-GCM key which encrypts the JWK JSON under a random 12-byte IV.
//! The wire form is `b64(ciphertext).b64(iv).b64(salt)` (standard base64).
//!
//! # Security
//!
//! A wrong password surfaces as the same `CryptoError::Decryption` as
//! corrupted ciphertext. Callers must not (and cannot) tell the cases
//! apart, which keeps error messages useless as a password oracle.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead as _, KeyInit as _},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore as _;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{error::CryptoError, jwk::Jwk, payload::IV_LEN};

/// PBKDF2 iteration count. Fixed by the wire format.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

fn derive_wrapping_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, key.as_mut());
    key
}

/// Encrypt a private JWK under a password.
///
/// Output format: `b64(ciphertext).b64(iv).b64(salt)`.
pub fn wrap_private_key(jwk: &Jwk, password: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let key = derive_wrapping_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let plaintext = Zeroizing::new(serde_json::to_string(jwk)?);
    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&iv), plaintext.as_bytes()) else {
        unreachable!("AES-256-GCM encryption cannot fail with valid inputs");
    };

    Ok(format!("{}.{}.{}", STANDARD.encode(ciphertext), STANDARD.encode(iv), STANDARD.encode(salt)))
}

/// Decrypt a wrapped private JWK with a password.
///
/// # Errors
///
/// - `Malformed` if the three-segment format is broken
/// - `Decryption` if the password is wrong or the ciphertext was tampered
///   with (indistinguishable by design)
pub fn unwrap_private_key(wrapped: &str, password: &str) -> Result<Jwk, CryptoError> {
    let segments: Vec<&str> = wrapped.split('.').collect();
    let [ciphertext, iv, salt] = segments.as_slice() else {
        return Err(CryptoError::Malformed(format!(
            "wrapped key must have 3 segments, got {}",
            segments.len()
        )));
    };
    let ciphertext = STANDARD.decode(ciphertext)?;
    let iv = STANDARD.decode(iv)?;
    let salt = STANDARD.decode(salt)?;
    if iv.len() != IV_LEN {
        return Err(CryptoError::Malformed("wrapped key IV must be 12 bytes".to_string()));
    }

    let key = derive_wrapping_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decryption)?,
    );

    serde_json::from_slice(&plaintext).map_err(|_| CryptoError::Decryption)
}

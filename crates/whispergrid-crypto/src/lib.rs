//! WhisperGrid Cryptographic Primitives
//!
//! Building blocks for the WhisperGrid protocol, all over NIST P-384:
//!
//! - ECDSA identity signatures (SHA-384 digests, raw `r || s` output)
//! - ECDH key agreement truncated to a 256-bit AES-GCM key
//! - JWK import/export and the `id-` thumbprint scheme
//! - Password wrapping of private keys (PBKDF2 + AES-256-GCM)
//! - Authenticated payload encryption with short-message padding
//!
//! # Key roles
//!
//! ```text
//! Identity (ECDSA)  ── signs every originated token
//! Storage  (ECDH)   ── self-encryption KEK for data at rest
//! Thread   (ECDH)   ── per-conversation agreement key
//!        │
//!        ▼
//! ECDH x-coordinate (first 256 bits)
//!        │
//!        ▼
//! AES-256-GCM ── message payloads
//! ```
//!
//! # Security
//!
//! - Decryption failures are opaque: wrong password, wrong secret and
//!   tampered ciphertext are the same error.
//! - Thumbprints hash only the curve point, never usage metadata.
//! - Secret scalars, derived secrets and wrapping keys zeroize on drop.

mod error;
mod jwk;
mod keys;
mod payload;
mod wrap;

pub use error::CryptoError;
pub use jwk::{Jwk, Thumbprint};
pub use keys::{AgreementKeyPair, SharedSecret, SigningKeyPair, verify_signature};
pub use payload::{EncryptedPayload, IV_LEN, MIN_PLAINTEXT_LEN, decrypt_payload, encrypt_payload};
pub use wrap::{PBKDF2_ITERATIONS, SALT_LEN, unwrap_private_key, wrap_private_key};

//! Thread identity and per-thread state.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use whispergrid_crypto::{Jwk, Thumbprint};

use crate::ordering::ThreadOrdering;

/// Deterministic, symmetric conversation identifier.
///
/// SHA-256 over the two participants' ECDH thumbprints sorted
/// lexicographically and joined by `:`, hex-encoded. Both parties compute
/// the same id regardless of who derives it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Derive the thread id for a pair of ECDH thumbprints.
    pub fn derive(a: &Thumbprint, b: &Thumbprint) -> ThreadId {
        let (low, high) =
            if a.as_str() <= b.as_str() { (a.as_str(), b.as_str()) } else { (b.as_str(), a.as_str()) };
        ThreadId(hex::encode(Sha256::digest(format!("{low}:{high}").as_bytes())))
    }

    /// Wrap an already-derived id string.
    pub fn parse(text: &str) -> Result<ThreadId, crate::storage::StorageError> {
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::storage::StorageError::Serialization(format!(
                "not a thread id: {text}"
            )));
        }
        Ok(ThreadId(text.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a party persists about one conversation.
///
/// # Invariants
///
/// - Once the handshake completes, the peer keys never change; only
///   `ordering` and `relays` mutate, and `ordering` only through the
///   ordering engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    /// The originating signed invitation, verbatim wire text.
    pub invitation: String,

    /// Thumbprint of this party's thread key (retrieves the self-encrypted
    /// private half).
    pub my_thread_key: Thumbprint,

    /// The peer's ephemeral ECDH public key for this thread.
    pub peer_epk: Jwk,

    /// The peer's identity (signature) public key.
    pub peer_signing_key: Jwk,

    /// Ordering-engine state for this thread.
    pub ordering: ThreadOrdering,

    /// Relay URL per participant thumbprint, learned from relay
    /// announcements.
    #[serde(default)]
    pub relays: BTreeMap<String, String>,
}

impl ThreadInfo {
    /// The relay the participant with `thumbprint` asked others to deliver
    /// to, if one was announced.
    pub fn relay_for(&self, thumbprint: &Thumbprint) -> Option<&str> {
        self.relays.get(thumbprint.as_str()).map(String::as_str)
    }
}

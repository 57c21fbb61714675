//! Namespaced storage keys.
//!
//! Every persisted record lives under a colon-delimited key. The scheme is
//! part of the external storage contract (backups reproduce it verbatim),
//! so the `Display` forms here are wire-stable.

use std::fmt;

use whispergrid_crypto::Thumbprint;

use crate::thread::ThreadId;

/// A typed storage key.
///
/// The variants cover every namespace the engine reads or writes:
///
/// - `identity:{thumbprint}`: stored identity record
/// - `invitation:{ecdhThumbprint}`: one signed invitation token
/// - `invitations:{identityThumbprint}`: list of invitation thumbprints
/// - `threads:{identityThumbprint}`: list of thread ids
/// - `thread-info:{identityThumbprint}:{threadId}`: thread record
/// - `encrypted-thread-key:{thumbprint}`: self-encrypted thread key
/// - `keyed-messages:{identityThumbprint}:{threadId}`: message log
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// `identity:{thumbprint}`
    Identity(Thumbprint),
    /// `invitation:{ecdhThumbprint}`
    Invitation(Thumbprint),
    /// `invitations:{identityThumbprint}`
    Invitations(Thumbprint),
    /// `threads:{identityThumbprint}`
    Threads(Thumbprint),
    /// `thread-info:{identityThumbprint}:{threadId}`
    ThreadInfo(Thumbprint, ThreadId),
    /// `encrypted-thread-key:{thumbprint}`
    EncryptedThreadKey(Thumbprint),
    /// `keyed-messages:{identityThumbprint}:{threadId}`
    KeyedMessages(Thumbprint, ThreadId),
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Identity(tp) => write!(f, "identity:{tp}"),
            StorageKey::Invitation(tp) => write!(f, "invitation:{tp}"),
            StorageKey::Invitations(tp) => write!(f, "invitations:{tp}"),
            StorageKey::Threads(tp) => write!(f, "threads:{tp}"),
            StorageKey::ThreadInfo(tp, thread) => write!(f, "thread-info:{tp}:{thread}"),
            StorageKey::EncryptedThreadKey(tp) => write!(f, "encrypted-thread-key:{tp}"),
            StorageKey::KeyedMessages(tp, thread) => write!(f, "keyed-messages:{tp}:{thread}"),
        }
    }
}

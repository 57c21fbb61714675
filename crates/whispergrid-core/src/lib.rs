//! WhisperGrid Core
//!
//! The stateful heart of a grid node, kept deliberately Sans-IO:
//!
//! - [`Storage`]: the namespaced key-value contract every backend
//!   implements, with [`MemoryStorage`] as the reference backend
//! - [`ThreadOrdering`]: the per-thread syn/ack window deciding which
//!   inbound messages are persisted
//! - [`Identity`]: key generation, password wrapping and self-encrypted
//!   thread-key custody
//! - [`ThreadId`] / [`ThreadInfo`]: the per-conversation record
//!
//! Nothing here performs network or disk IO directly; the client crate
//! drives these pieces and a [`Storage`] backend supplies persistence.

mod identity;
mod ordering;
pub mod storage;
mod thread;

pub use identity::{Identity, IdentityError, StoredIdentity};
pub use ordering::{DEFAULT_WINDOW_SIZE, OrderingError, ThreadOrdering};
pub use storage::{MemoryStorage, Storage, StorageError, StorageKey};
pub use thread::{ThreadId, ThreadInfo};

//! WhisperGrid Protocol Engine
//!
//! The top-level client for running a grid node: create an identity over
//! any [`Storage`](whispergrid_core::Storage) backend, issue and answer
//! invitations, exchange encrypted thread replies and restore everything
//! from a signed backup.
//!
//! ```no_run
//! use whispergrid_client::{Client, ReplyOptions};
//! use whispergrid_core::MemoryStorage;
//!
//! # fn main() -> Result<(), whispergrid_client::ClientError> {
//! let mut alice = Client::generate(MemoryStorage::new(), "alice-password")?;
//! let invitation = alice.create_invitation("Alice", Some("hi"))?;
//!
//! let mut bob = Client::generate(MemoryStorage::new(), "bob-password")?;
//! let reply = bob.reply_to_invitation(
//!     invitation.as_str(),
//!     "hello",
//!     &ReplyOptions::default(),
//! )?;
//!
//! let appended = alice.append_thread(reply.token.as_str(), None)?;
//! for message in alice.decrypt_thread(appended.thread_id())? {
//!     println!("{}: {}", message.from, message.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The engine is synchronous and Sans-IO; delivery is the caller's
//! concern. With the `relay` feature the [`relay`] module offers a
//! minimal best-effort HTTP push/poll pair.

mod client;
mod decrypted;
mod error;
mod event;
#[cfg(feature = "relay")]
pub mod relay;

pub use client::{Appended, Client, Outgoing, ReplyOptions};
pub use decrypted::DecryptedMessage;
pub use error::ClientError;
pub use event::ClientEvent;

//! Client events.
//!
//! The engine records what happened during each operation in a drain-style
//! queue owned by the caller's loop. There is no subscriber registry and
//! no implicit dispatch: whoever drives the client decides when to look.

use whispergrid_core::ThreadId;
use whispergrid_crypto::Thumbprint;
use whispergrid_proto::MessageId;

/// Something the engine did that a UI or driver loop may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A new invitation was created and stored.
    InvitationCreated {
        /// Thumbprint of the invitation's thread key.
        thumbprint: Thumbprint,
    },

    /// A thread came into existence (handshake completed on either side).
    ThreadCreated {
        /// The new thread.
        thread_id: ThreadId,
    },

    /// A message was admitted and persisted to a thread log.
    MessageAppended {
        /// The thread it landed in.
        thread_id: ThreadId,
        /// Id of the admitted message.
        message_id: MessageId,
    },

    /// A participant announced a relay URL.
    RelayLearned {
        /// The thread the announcement arrived in.
        thread_id: ThreadId,
        /// The announcing participant's identity thumbprint.
        thumbprint: Thumbprint,
        /// Where that participant asked to be reached.
        url: String,
    },
}

//! The syn/ack ordering window.
//!
//! A small deterministic state machine, tracked per thread, that decides
//! whether an inbound message is persisted. It is the sole gatekeeper for
//! the message log: duplicates and replays are silently rejected, bounded
//! out-of-order delivery is tolerated, and a gap wider than the window is
//! a hard stop until the caller backfills.
//!
//! # State
//!
//! - `syn`: last id this party sent (its send sequence)
//! - `min_ack`: contiguous-received lower bound of the peer's sequence;
//!   every peer id up to and including it has been seen
//! - `max_ack`: highest peer id seen
//! - `missing`: known gaps between `min_ack` and `max_ack` awaiting fill
//! - `window_size`: maximum tolerated `min_ack`-to-newest distance
//!
//! # Invariants
//!
//! - `min_ack <= max_ack` whenever both are set.
//! - `missing` only ever holds ids strictly between `min_ack` and
//!   `max_ack`.
//! - A rejected duplicate mutates nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use whispergrid_proto::MessageId;

/// Default maximum tolerated gap between `min_ack` and a newly seen id.
pub const DEFAULT_WINDOW_SIZE: u32 = 5;

/// Errors from the ordering window. All of them are fatal to the current
/// operation; duplicates are *not* errors (see [`ThreadOrdering::accept`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    /// A locally sent message skipped the send sequence. Indicates a local
    /// bug, never a network condition.
    #[error("message out of order: expected {expected}, got {got}")]
    SynOutOfOrder {
        /// The only id that would have been accepted.
        expected: MessageId,
        /// The id that was offered.
        got: MessageId,
    },

    /// The gap between `min_ack` and a newly seen id exceeds the window.
    /// The caller must backfill the missing messages before continuing;
    /// this bounds buffering under loss.
    #[error("Missing {count} messages between {from} and {to}")]
    GapExceedsWindow {
        /// How many ids are unaccounted for, exclusive of both bounds.
        count: u64,
        /// The contiguous-received lower bound at the time of failure.
        from: MessageId,
        /// The id that overflowed the window.
        to: MessageId,
    },

    /// An id that matches no transition rule (between the bounds but not
    /// adjacent to either, and not a known duplicate).
    #[error("ack out of order: {ack}")]
    AckOutOfOrder {
        /// The offending id.
        ack: MessageId,
    },
}

/// Per-thread ordering state.
///
/// Serialized into the thread record; field names are wire-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadOrdering {
    /// Last id this party sent.
    pub syn: Option<MessageId>,

    /// Contiguous-received lower bound of the peer's sequence.
    pub min_ack: Option<MessageId>,

    /// Highest peer id seen.
    pub max_ack: Option<MessageId>,

    /// Known gaps awaiting fill.
    pub missing: Vec<MessageId>,

    /// Maximum tolerated gap before ingestion fails.
    pub window_size: u32,
}

impl Default for ThreadOrdering {
    fn default() -> Self {
        ThreadOrdering {
            syn: None,
            min_ack: None,
            max_ack: None,
            missing: Vec::new(),
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl ThreadOrdering {
    /// Fresh state with the default window.
    pub fn new() -> ThreadOrdering {
        ThreadOrdering::default()
    }

    /// The id the next outbound message must carry, if a sequence has
    /// started. A thread's very first local message draws a random id
    /// instead.
    pub fn next_syn(&self) -> Option<MessageId> {
        self.syn.map(MessageId::next)
    }

    /// Record a locally sent message id.
    ///
    /// The first id ever sent initializes the sequence; every later id
    /// must be exactly the increment of the previous one.
    ///
    /// # Errors
    ///
    /// `SynOutOfOrder` when the id skips or repeats, a local invariant
    /// violation, fatal by design.
    pub fn record_syn(&mut self, id: MessageId) -> Result<(), OrderingError> {
        match self.syn {
            None => {
                self.syn = Some(id);
                Ok(())
            }
            Some(current) => {
                let expected = current.next();
                if id == expected {
                    self.syn = Some(id);
                    Ok(())
                } else {
                    Err(OrderingError::SynOutOfOrder { expected, got: id })
                }
            }
        }
    }

    /// Admit or reject a peer message id.
    ///
    /// Returns `Ok(true)` when the message should be persisted and
    /// `Ok(false)` for a duplicate (silently dropped, no state change).
    /// This decision is what makes replayed and re-delivered messages
    /// idempotent.
    ///
    /// # Errors
    ///
    /// - `GapExceedsWindow` when the distance from `min_ack` to a new id
    ///   reaches `window_size`
    /// - `AckOutOfOrder` for ids that match no transition rule
    pub fn accept(&mut self, ack: MessageId) -> Result<bool, OrderingError> {
        let (Some(min), Some(max)) = (self.min_ack, self.max_ack) else {
            // First ever peer message initializes both bounds.
            self.min_ack = Some(ack);
            self.max_ack = Some(ack);
            return Ok(true);
        };

        if ack == max.next() {
            // In-order arrival at the high end; catch min up when there is
            // no gap below.
            self.max_ack = Some(ack);
            if ack == min.next() {
                self.min_ack = Some(ack);
            }
            return Ok(true);
        }

        if ack == min.next() {
            // Fills from the low end while a gap remains above.
            self.min_ack = Some(ack);
            self.missing.retain(|id| *id != ack);
            return Ok(true);
        }

        if ack <= min || ack == max {
            debug!(ack = %ack, "duplicate message id dropped");
            return Ok(false);
        }

        if ack > max {
            let distance = ack.value() - min.value();
            if u64::from(self.window_size) <= distance {
                return Err(OrderingError::GapExceedsWindow {
                    count: distance - 1,
                    from: min,
                    to: ack,
                });
            }
            if self.missing.is_empty() {
                self.missing = ((min.value() + 1)..ack.value())
                    .filter_map(|value| MessageId::new(value).ok())
                    .collect();
            }
            self.missing.retain(|id| *id != ack);
            self.max_ack = Some(ack);
            debug!(ack = %ack, gaps = self.missing.len(), "out-of-order message admitted");
            return Ok(true);
        }

        // Between the bounds but adjacent to neither and not a recorded
        // duplicate: the sequence is incoherent.
        Err(OrderingError::AckOutOfOrder { ack })
    }
}

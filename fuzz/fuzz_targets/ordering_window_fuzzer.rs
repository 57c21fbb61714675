//! Fuzz target for the ordering window state machine
//!
//! Drives an arbitrary interleaving of syn records and ack admissions.
//!
//! # Invariants
//!
//! - Never panics, whatever the id sequence
//! - `min_ack <= max_ack` whenever both are set
//! - `missing` only holds ids strictly between the bounds
//! - A rejected duplicate leaves the state untouched

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use whispergrid_core::ThreadOrdering;
use whispergrid_proto::MessageId;

#[derive(Debug, Clone, Arbitrary)]
enum WindowOp {
    RecordSyn(u64),
    Accept(u64),
}

fuzz_target!(|ops: Vec<WindowOp>| {
    let mut state = ThreadOrdering::new();

    for op in ops {
        match op {
            WindowOp::RecordSyn(value) => {
                if let Ok(id) = MessageId::new(value) {
                    let _ = state.record_syn(id);
                }
            }
            WindowOp::Accept(value) => {
                let Ok(id) = MessageId::new(value) else { continue };
                let before = state.clone();
                match state.accept(id) {
                    Ok(true) => {}
                    Ok(false) => assert_eq!(state, before),
                    Err(_) => {}
                }
            }
        }

        if let (Some(min), Some(max)) = (state.min_ack, state.max_ack) {
            assert!(min <= max);
            for gap in &state.missing {
                assert!(*gap > min && *gap < max);
            }
        }
    }
});

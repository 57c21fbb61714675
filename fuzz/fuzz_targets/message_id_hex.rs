//! Fuzz target for MessageId hex parsing
//!
//! Arbitrary strings through the hex wire form, checking the round-trip on
//! accepted values.

#![no_main]

use libfuzzer_sys::fuzz_target;
use whispergrid_proto::MessageId;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(id) = MessageId::from_hex(text) {
            // Accepted ids must round-trip through their own wire form.
            assert_eq!(MessageId::from_hex(&id.to_hex()), Ok(id));
        }
    }
});

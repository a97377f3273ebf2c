//! Fuzz target for InboundEvent::decode
//!
//! Inbound frames come straight from the network. Arbitrary text must decode
//! to an event or fail with an error, never panic. Decoded events must
//! survive a re-encode and decode unchanged.

#![no_main]

use duelsync_proto::InboundEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(event) = InboundEvent::decode(text) else {
        return;
    };

    let encoded = event.encode().expect("decoded event must encode");
    let again = InboundEvent::decode(&encoded).expect("encoded event must decode");
    assert_eq!(event, again);
});

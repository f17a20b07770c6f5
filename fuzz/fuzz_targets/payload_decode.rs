//! Fuzz target for `ControlMessage::from_json`
//!
//! This fuzzer tests backbone control-message deserialization (JSON
//! decoding, §6) with:
//! - Malformed JSON
//! - Type confusion between the `type` tag and its `data` payload
//! - Oversized or deeply nested `Payload::Bytes`/`Payload::Text` bodies
//! - Missing required envelope fields (`from`, `to`, `timestamp`)
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nexdigi_proto::ControlMessage;

fuzz_target!(|data: &[u8]| {
    // Attempt to decode arbitrary bytes as a control-message envelope. This
    // should never panic, only return `Err` for malformed or semantically
    // invalid JSON.
    if let Ok(msg) = ControlMessage::from_json(data) {
        // A successfully parsed envelope must re-serialize without
        // panicking, and round-trip back to an equal value.
        if let Ok(reencoded) = msg.to_json() {
            let _ = ControlMessage::from_json(&reencoded);
        }
    }
});

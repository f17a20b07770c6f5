//! Fuzz target for `Ax25Frame::parse`
//!
//! This fuzzer tests AX.25 frame decoding with arbitrary byte sequences to
//! find:
//! - Parser crashes or panics
//! - Off-by-one errors walking the 7-byte address fields
//! - Address-count overruns (`TooManyAddresses`) or missing E-bit
//!   (`NoEndBit`) handling
//! - Truncated buffers that should return `FrameTooShort` rather than
//!   panicking on an out-of-bounds slice
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nexdigi_proto::Ax25Frame;

fuzz_target!(|data: &[u8]| {
    // Attempt to decode arbitrary bytes as an AX.25 UI frame. This should
    // never panic, only return `Err` for malformed input.
    if let Ok(frame) = Ax25Frame::parse(data) {
        // A successfully parsed frame must round-trip through `emit`
        // without panicking, and must respect the address-count budget.
        let re_emitted = frame.emit();
        assert!(frame.address_count() <= nexdigi_proto::MAX_ADDRESSES);
        let _ = Ax25Frame::parse(&re_emitted);
    }
});

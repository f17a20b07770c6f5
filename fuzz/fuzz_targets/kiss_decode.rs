//! Fuzz target for `KissDecoder`
//!
//! Exercises the KISS byte-stream framing layer (§4.3/§6) — FEND-delimited
//! frames with `C0`/`DB` escaping — against arbitrary input, including
//! truncated streams fed in multiple chunks.
//!
//! The fuzzer should NEVER panic. All invalid or partial input should return
//! an error or `Ok(None)` (awaiting more bytes).

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use nexdigi_proto::KissDecoder;
use tokio_util::codec::Decoder;

fuzz_target!(|chunks: Vec<Vec<u8>>| {
    let mut decoder = KissDecoder;
    let mut buf = BytesMut::new();

    for chunk in chunks {
        buf.extend_from_slice(&chunk);
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(_frame)) => continue,
                Ok(None) => break,
                Err(_) => break,
            }
        }
    }
});

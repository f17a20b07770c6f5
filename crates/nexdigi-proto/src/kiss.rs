//! KISS framing: the byte-stream protocol spoken between a host and a TNC.
//!
//! `FEND` (`0xC0`) delimits frames. Within a frame, in-band `FEND`/`FESC`
//! bytes are escaped as `FESC TFEND` / `FESC TFESC`. The first byte after the
//! leading `FEND` packs a port index (high nibble) and a command (low
//! nibble, `0` = data frame).
//!
//! [`KissDecoder`] implements [`tokio_util::codec::Decoder`] so a transport
//! can be wrapped in a `Framed` stream; [`KissEncoder`] is the matching
//! `Encoder`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtoError;

const FEND: u8 = 0xC0;
const FESC: u8 = 0xDB;
const TFEND: u8 = 0xDC;
const TFESC: u8 = 0xDD;

/// KISS command value for a data frame (the only command this node emits).
pub const COMMAND_DATA: u8 = 0x00;

/// A single decoded KISS frame: port index, command nibble, and the
/// unescaped payload (for data frames, a raw AX.25 byte string).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KissFrame {
    /// Port index the frame is addressed to/from (high nibble of the header byte).
    pub port: u8,
    /// KISS command (low nibble); `0` is a data frame.
    pub command: u8,
    /// Unescaped payload bytes.
    pub payload: Bytes,
}

impl KissFrame {
    /// Builds a data-frame KISS frame for the given port.
    #[must_use]
    pub fn data(port: u8, payload: impl Into<Bytes>) -> Self {
        Self { port, command: COMMAND_DATA, payload: payload.into() }
    }
}

/// Escapes `src` (raw payload bytes) and appends the result to `dst`,
/// in-place, without surrounding `FEND` delimiters.
fn escape_into(src: &[u8], dst: &mut impl BufMut) {
    for &b in src {
        match b {
            FEND => {
                dst.put_u8(FESC);
                dst.put_u8(TFEND);
            }
            FESC => {
                dst.put_u8(FESC);
                dst.put_u8(TFESC);
            }
            other => dst.put_u8(other),
        }
    }
}

/// Encodes one complete KISS frame (leading and trailing `FEND` included).
pub fn encode_frame(frame: &KissFrame, dst: &mut impl BufMut) {
    dst.put_u8(FEND);
    dst.put_u8(((frame.port & 0x0F) << 4) | (frame.command & 0x0F));
    escape_into(&frame.payload, dst);
    dst.put_u8(FEND);
}

/// Tokio codec [`Encoder`] for [`KissFrame`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct KissEncoder;

impl Encoder<KissFrame> for KissEncoder {
    type Error = ProtoError;

    fn encode(&mut self, item: KissFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

/// Tokio codec [`Decoder`] for [`KissFrame`]s, fed raw bytes from a transport.
///
/// Leading `FEND`s (including back-to-back frame delimiters) are tolerated
/// and skipped, matching common TNC behavior of padding frames with extra
/// `FEND` bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct KissDecoder;

impl Decoder for KissDecoder {
    type Item = KissFrame;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Discard leading FENDs; nothing to do until we see real data.
        while src.first() == Some(&FEND) {
            src.advance(1);
        }

        let Some(end) = src.iter().position(|&b| b == FEND) else {
            return Ok(None);
        };

        let frame_bytes = src.split_to(end);
        src.advance(1); // consume the terminating FEND

        if frame_bytes.is_empty() {
            return self.decode(src);
        }

        let header = frame_bytes[0];
        let port = header >> 4;
        let command = header & 0x0F;

        let mut payload = Vec::with_capacity(frame_bytes.len());
        let mut iter = frame_bytes[1..].iter().copied().peekable();
        while let Some(b) = iter.next() {
            if b == FESC {
                match iter.next() {
                    Some(TFEND) => payload.push(FEND),
                    Some(TFESC) => payload.push(FESC),
                    Some(other) => payload.push(other),
                    None => return Err(ProtoError::MalformedKiss),
                }
            } else {
                payload.push(b);
            }
        }

        Ok(Some(KissFrame { port, command, payload: Bytes::from(payload) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_plain_payload() {
        let frame = KissFrame::data(0, Bytes::from_static(&[1, 2, 3, 4]));
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);

        let mut decoder = KissDecoder;
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn escapes_in_band_fend_and_fesc() {
        let frame = KissFrame::data(1, Bytes::from_static(&[FEND, 0x01, FESC, 0x02]));
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);

        // FEND header, header byte, FESC TFEND, 0x01, FESC TFESC, 0x02, FEND
        assert_eq!(buf[0], FEND);
        assert!(buf.iter().filter(|&&b| b == FESC).count() == 2);

        let mut decoder = KissDecoder;
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload, frame.payload);
        assert_eq!(decoded.port, 1);
    }

    #[test]
    fn decoder_waits_for_full_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[FEND, 0x00, 1, 2, 3]);
        let mut decoder = KissDecoder;
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&[4, FEND]);
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn tolerates_back_to_back_fends() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[FEND, FEND, 0x00, 9, FEND]);
        let mut decoder = KissDecoder;
        let decoded = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload.as_ref(), &[9]);
    }
}

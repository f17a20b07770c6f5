//! AX.25 UI (unnumbered information) frame: the address list, control/PID
//! bytes, and payload that every APRS packet is carried in.
//!
//! Layout on the wire: `[address list: 2..=10 addresses, 7 bytes each]
//! [control: 0x03] [PID: 0xF0] [payload]`.

use bytes::Bytes;

use crate::address::{ADDRESS_LEN, Ax25Address};
use crate::error::ProtoError;

/// AX.25 UI control field value (unnumbered information).
pub const CONTROL_UI: u8 = 0x03;

/// AX.25 PID value meaning "no layer 3" (used by APRS).
pub const PID_NO_LAYER3: u8 = 0xF0;

/// Minimum number of addresses in a valid frame (destination, source).
pub const MIN_ADDRESSES: usize = 2;

/// Maximum number of digipeater addresses a path may carry.
pub const MAX_DIGIPEATERS: usize = 8;

/// Maximum total addresses (destination + source + digipeaters).
pub const MAX_ADDRESSES: usize = MIN_ADDRESSES + MAX_DIGIPEATERS;

/// A parsed AX.25 UI frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ax25Frame {
    /// Destination address (first in the address list).
    pub destination: Ax25Address,
    /// Source address (second in the address list).
    pub source: Ax25Address,
    /// Digipeater path, in traversal order. At most [`MAX_DIGIPEATERS`].
    pub digipeaters: Vec<Ax25Address>,
    /// Frame payload (information field).
    pub payload: Bytes,
}

impl Ax25Frame {
    /// Parses a raw AX.25 UI frame from post-KISS-decoded bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtoError::FrameTooShort`] if the buffer ends mid-address or has
    ///   no room for control/PID bytes.
    /// - [`ProtoError::NoEndBit`] if no address in the first
    ///   [`MAX_ADDRESSES`] slots carries the E-bit.
    /// - [`ProtoError::TooManyAddresses`] if more than [`MAX_ADDRESSES`]
    ///   address fields are present before an E-bit is seen.
    /// - [`ProtoError::BadControl`] if the control or PID byte does not match
    ///   [`CONTROL_UI`] / [`PID_NO_LAYER3`].
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtoError> {
        let mut addresses = Vec::with_capacity(MIN_ADDRESSES);
        let mut offset = 0usize;

        loop {
            if addresses.len() >= MAX_ADDRESSES {
                return Err(ProtoError::TooManyAddresses);
            }
            if bytes.len() < offset + ADDRESS_LEN {
                return Err(ProtoError::FrameTooShort);
            }
            let addr = Ax25Address::decode(&bytes[offset..offset + ADDRESS_LEN])?;
            offset += ADDRESS_LEN;
            let last = addr.e_bit;
            addresses.push(addr);
            if last {
                break;
            }
        }

        if addresses.len() < MIN_ADDRESSES {
            return Err(ProtoError::NoEndBit);
        }

        if bytes.len() < offset + 2 {
            return Err(ProtoError::FrameTooShort);
        }
        let control = bytes[offset];
        let pid = bytes[offset + 1];
        if control != CONTROL_UI || pid != PID_NO_LAYER3 {
            return Err(ProtoError::BadControl);
        }
        offset += 2;

        let destination = addresses.remove(0);
        let source = addresses.remove(0);
        let digipeaters = addresses;
        let payload = Bytes::copy_from_slice(&bytes[offset..]);

        Ok(Self { destination, source, digipeaters, payload })
    }

    /// Emits this frame back to wire bytes, the inverse of [`Ax25Frame::parse`].
    ///
    /// The E-bit is set on the last address only, regardless of what it was
    /// set to on the individual [`Ax25Address`] values.
    #[must_use]
    pub fn emit(&self) -> Vec<u8> {
        let total_addrs = 2 + self.digipeaters.len();
        let mut out = Vec::with_capacity(total_addrs * ADDRESS_LEN + 2 + self.payload.len());

        let mut push_addr = |addr: &Ax25Address, is_last: bool| {
            let mut a = addr.clone();
            a.e_bit = is_last;
            out.extend_from_slice(&a.encode());
        };

        push_addr(&self.destination, false);
        push_addr(&self.source, self.digipeaters.is_empty());
        for (i, digi) in self.digipeaters.iter().enumerate() {
            push_addr(digi, i == self.digipeaters.len() - 1);
        }

        out.push(CONTROL_UI);
        out.push(PID_NO_LAYER3);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Total address count (destination + source + digipeaters).
    #[must_use]
    pub fn address_count(&self) -> usize {
        2 + self.digipeaters.len()
    }

    /// Services a WIDE-N style alias: the first unmarked digipeater address
    /// whose base matches `alias_base` and whose SSID is non-zero,
    /// left to right. Decrements its SSID, sets its H-bit if the SSID
    /// reaches zero, and optionally inserts `own` immediately before it
    /// (marked as already repeated) if doing so would not exceed
    /// [`MAX_DIGIPEATERS`].
    ///
    /// Returns `true` if an address was serviced, `false` if no matching,
    /// unmarked, non-zero-SSID address was found. Byte layout elsewhere in
    /// the frame is untouched.
    pub fn service_wide_alias(&mut self, alias_base: &str, own: Option<Ax25Address>) -> bool {
        let Some(idx) = self.digipeaters.iter().position(|a| {
            a.callsign.base() == alias_base && a.callsign.ssid() > 0 && !a.h_bit
        }) else {
            return false;
        };

        let addr = &mut self.digipeaters[idx];
        let new_ssid = addr.callsign.ssid() - 1;
        addr.callsign = addr.callsign.with_ssid(new_ssid);
        if new_ssid == 0 {
            addr.h_bit = true;
        }

        self.insert_before(idx, own);
        true
    }

    /// Services an exact personal-alias/own-callsign hop: the first unmarked
    /// digipeater address whose callsign (base and SSID) equals `target`,
    /// left to right. Sets its H-bit (no SSID decrement, since the hop is
    /// addressed directly rather than via a hop-count alias) and optionally
    /// inserts `own` immediately before it.
    ///
    /// Returns `true` if an address was serviced, `false` otherwise.
    pub fn service_exact_address(
        &mut self,
        target: &crate::callsign::Callsign,
        own: Option<Ax25Address>,
    ) -> bool {
        let Some(idx) =
            self.digipeaters.iter().position(|a| &a.callsign == target && !a.h_bit)
        else {
            return false;
        };

        self.digipeaters[idx].h_bit = true;
        self.insert_before(idx, own);
        true
    }

    /// Inserts `own` immediately before digipeater index `idx`, marked as
    /// already repeated, unless the path is already at [`MAX_DIGIPEATERS`].
    fn insert_before(&mut self, idx: usize, own: Option<Ax25Address>) {
        if let Some(mut own) = own {
            if self.digipeaters.len() < MAX_DIGIPEATERS {
                own.h_bit = true;
                self.digipeaters.insert(idx, own);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsign::Callsign;

    fn addr(base: &str, ssid: u8) -> Ax25Address {
        Ax25Address::new(Callsign::new(base, ssid).unwrap())
    }

    fn sample_frame() -> Ax25Frame {
        Ax25Frame {
            destination: addr("APRS", 0),
            source: addr("N0CALL", 0),
            digipeaters: vec![addr("WIDE1", 1), addr("WIDE2", 2)],
            payload: Bytes::from_static(b"!4903.50N/07201.75W-test"),
        }
    }

    #[test]
    fn round_trip() {
        let frame = sample_frame();
        let wire = frame.emit();
        let parsed = Ax25Frame::parse(&wire).unwrap();
        assert_eq!(frame, parsed);
    }

    #[test]
    fn services_wide1_and_inserts_own_callsign() {
        let mut frame = sample_frame();
        let own = addr("DIGI", 0);
        let serviced = frame.service_wide_alias("WIDE1", Some(own.clone()));
        assert!(serviced);
        // own callsign inserted before the serviced WIDE1 hop
        assert_eq!(frame.digipeaters[0].callsign, own.callsign);
        assert!(frame.digipeaters[0].h_bit);
        assert_eq!(frame.digipeaters[1].callsign.base(), "WIDE1");
        assert_eq!(frame.digipeaters[1].callsign.ssid(), 0);
        assert!(frame.digipeaters[1].h_bit);
        // WIDE2-2 untouched
        assert_eq!(frame.digipeaters[2].callsign.ssid(), 2);
        assert!(!frame.digipeaters[2].h_bit);
    }

    #[test]
    fn service_wide_alias_skips_marked_hops() {
        let mut frame = sample_frame();
        frame.digipeaters[0].h_bit = true; // WIDE1-1 already serviced
        let serviced = frame.service_wide_alias("WIDE1", None);
        assert!(!serviced);
    }

    #[test]
    fn service_exact_address_sets_h_bit_without_decrementing_ssid() {
        let mut frame = sample_frame();
        frame.digipeaters.push(addr("N0CALL", 0));
        let target = Callsign::new("N0CALL", 0).unwrap();
        let serviced = frame.service_exact_address(&target, None);
        assert!(serviced);
        assert!(frame.digipeaters.last().unwrap().h_bit);
    }

    #[test]
    fn insert_refused_when_path_already_full() {
        let mut frame = sample_frame();
        frame.digipeaters = (0..8).map(|i| addr("WIDE1", (i % 7) + 1)).collect();
        let own = addr("DIGI", 0);
        let before_len = frame.digipeaters.len();
        let serviced = frame.service_wide_alias("WIDE1", Some(own));
        assert!(serviced);
        assert_eq!(frame.digipeaters.len(), before_len);
    }

    #[test]
    fn only_last_address_has_e_bit_on_emit() {
        let frame = sample_frame();
        let wire = frame.emit();
        let parsed = Ax25Frame::parse(&wire).unwrap();
        assert!(!parsed.destination.e_bit);
        assert!(!parsed.source.e_bit);
        assert!(!parsed.digipeaters[0].e_bit);
        assert!(parsed.digipeaters[1].e_bit);
    }

    #[test]
    fn rejects_too_few_addresses() {
        let dest = addr("APRS", 0);
        let mut bytes = dest.encode().to_vec();
        // mark E-bit on the single address so the loop terminates
        bytes[6] |= 0x01;
        bytes.push(CONTROL_UI);
        bytes.push(PID_NO_LAYER3);
        assert!(matches!(Ax25Frame::parse(&bytes), Err(ProtoError::NoEndBit)));
    }

    #[test]
    fn rejects_bad_control() {
        let frame = sample_frame();
        let mut wire = frame.emit();
        let control_offset = frame.address_count() * ADDRESS_LEN;
        wire[control_offset] = 0x00;
        assert!(matches!(Ax25Frame::parse(&wire), Err(ProtoError::BadControl)));
    }

    #[test]
    fn rejects_more_than_eight_digipeaters() {
        let mut frame = sample_frame();
        frame.digipeaters = (0..9).map(|i| addr("WIDE1", (i % 8) + 1)).collect();
        let wire = frame.emit();
        assert!(matches!(Ax25Frame::parse(&wire), Err(ProtoError::TooManyAddresses)));
    }

    proptest::proptest! {
        #[test]
        fn address_budget_never_exceeded(n in 0usize..=8) {
            let mut frame = sample_frame();
            frame.digipeaters = (0..n).map(|i| addr("WIDE1", ((i % 7) + 1) as u8)).collect();
            let wire = frame.emit();
            let parsed = Ax25Frame::parse(&wire).unwrap();
            proptest::prop_assert!(parsed.address_count() <= MAX_ADDRESSES);
            proptest::prop_assert_eq!(frame, parsed);
        }
    }
}

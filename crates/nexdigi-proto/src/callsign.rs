//! Amateur radio callsign: a 1–6 character alphanumeric base plus an SSID in
//! `0..=15`.
//!
//! Equality and hashing are by `(base, ssid)` only — canonical text form
//! (`BASE` or `BASE-SSID`) is derived, never stored as the comparison key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Maximum length of the base callsign (before the SSID).
pub const MAX_BASE_LEN: usize = 6;

/// Maximum SSID value (4-bit field).
pub const MAX_SSID: u8 = 15;

/// A callsign base plus SSID, e.g. `N0CALL-5`.
#[derive(Clone, Eq, Serialize, Deserialize)]
pub struct Callsign {
    base: String,
    ssid: u8,
}

impl Callsign {
    /// Builds a callsign from a base string and SSID.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidCallsign`] if `base` is empty, longer than
    /// [`MAX_BASE_LEN`], not all-uppercase-alphanumeric, or `ssid` exceeds
    /// [`MAX_SSID`].
    pub fn new(base: &str, ssid: u8) -> Result<Self, ProtoError> {
        if base.is_empty() || base.len() > MAX_BASE_LEN {
            return Err(ProtoError::InvalidCallsign(base.to_string()));
        }
        if !base.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return Err(ProtoError::InvalidCallsign(base.to_string()));
        }
        if ssid > MAX_SSID {
            return Err(ProtoError::InvalidCallsign(format!("{base}-{ssid}")));
        }
        Ok(Self { base: base.to_string(), ssid })
    }

    /// The base callsign (uppercase, no SSID).
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The SSID, `0..=15`.
    #[must_use]
    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Returns a copy with the SSID replaced.
    #[must_use]
    pub fn with_ssid(&self, ssid: u8) -> Self {
        Self { base: self.base.clone(), ssid: ssid.min(MAX_SSID) }
    }
}

impl PartialEq for Callsign {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.ssid == other.ssid
    }
}

impl std::hash::Hash for Callsign {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.ssid.hash(state);
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.base)
        } else {
            write!(f, "{}-{}", self.base, self.ssid)
        }
    }
}

impl fmt::Debug for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callsign({self})")
    }
}

impl FromStr for Callsign {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((base, ssid_str)) => {
                let ssid: u8 = ssid_str
                    .parse()
                    .map_err(|_| ProtoError::InvalidCallsign(s.to_string()))?;
                Self::new(base, ssid)
            }
            None => Self::new(s, 0),
        }
    }
}

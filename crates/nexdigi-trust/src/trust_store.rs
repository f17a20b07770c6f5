//! Trusted-node table: callsign → public key, plus the admission policy for
//! unknown senders (§4.8).

use std::collections::HashMap;

use nexdigi_crypto::PublicKey;
use nexdigi_proto::Callsign;

/// Policy governing how a public key is bound to a peer that is not already
/// in the trusted-node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Only peers already present in the trusted-node table may
    /// authenticate; an unknown sender's `AUTH_REQUEST` is rejected.
    RequireTrusted,
    /// An unknown sender is admitted, binding the public key it supplied in
    /// its `AUTH_REQUEST` for future sessions ("trust on first use").
    TrustOnFirstUse,
}

/// Maps peer callsigns to their trusted Ed25519 public key.
///
/// A key already on file always takes precedence over one supplied in an
/// incoming `AUTH_REQUEST` (§4.8): an attacker cannot override a pinned key
/// by presenting a different one.
#[derive(Debug, Clone, Default)]
pub struct TrustedNodeTable {
    keys: HashMap<Callsign, PublicKey>,
}

impl TrustedNodeTable {
    /// Builds an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins a trusted key for `peer`, e.g. from static configuration.
    pub fn pin(&mut self, peer: Callsign, key: PublicKey) {
        self.keys.insert(peer, key);
    }

    /// Looks up the trusted key on file for `peer`, if any.
    #[must_use]
    pub fn lookup(&self, peer: &Callsign) -> Option<PublicKey> {
        self.keys.get(peer).copied()
    }

    /// Resolves the public key to use for `peer`'s handshake: the pinned
    /// key if one is on file, otherwise `supplied` if `policy` is
    /// [`TrustPolicy::TrustOnFirstUse`] (and the key is then pinned for
    /// future sessions), otherwise `None`.
    pub fn resolve(&mut self, peer: &Callsign, supplied: PublicKey, policy: TrustPolicy) -> Option<PublicKey> {
        if let Some(pinned) = self.lookup(peer) {
            return Some(pinned);
        }
        match policy {
            TrustPolicy::RequireTrusted => None,
            TrustPolicy::TrustOnFirstUse => {
                self.pin(peer.clone(), supplied);
                Some(supplied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexdigi_crypto::NodeIdentity;

    fn peer() -> Callsign {
        "N0CALL".parse().unwrap()
    }

    #[test]
    fn pinned_key_takes_precedence_over_supplied() {
        let pinned_identity = NodeIdentity::generate();
        let supplied_identity = NodeIdentity::generate();
        let mut table = TrustedNodeTable::new();
        table.pin(peer(), pinned_identity.public_key());

        let resolved = table.resolve(&peer(), supplied_identity.public_key(), TrustPolicy::TrustOnFirstUse);
        assert_eq!(resolved, Some(pinned_identity.public_key()));
    }

    #[test]
    fn require_trusted_rejects_unknown_peer() {
        let mut table = TrustedNodeTable::new();
        let supplied = NodeIdentity::generate().public_key();
        assert_eq!(table.resolve(&peer(), supplied, TrustPolicy::RequireTrusted), None);
    }

    #[test]
    fn trust_on_first_use_pins_supplied_key() {
        let mut table = TrustedNodeTable::new();
        let supplied = NodeIdentity::generate().public_key();
        let resolved = table.resolve(&peer(), supplied, TrustPolicy::TrustOnFirstUse);
        assert_eq!(resolved, Some(supplied));
        assert_eq!(table.lookup(&peer()), Some(supplied));
    }
}

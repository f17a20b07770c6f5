//! Backbone control message envelope: the JSON documents peers exchange for
//! routing (LSA, route discovery/reply) and authentication.
//!
//! Every message carries `from`, `to`, `timestamp`, and — where security
//! applies — `nonce`, with a `type` tag selecting the variant-specific body
//! (serialized under `data`, adjacently tagged).

use serde::{Deserialize, Serialize};

use crate::callsign::Callsign;
use crate::error::ProtoError;
use crate::payload::Payload;

/// A link-cost pair as carried in an [`LsaBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCost {
    /// Neighbor callsign.
    pub neighbor: Callsign,
    /// Cost of the link to that neighbor.
    pub cost: u32,
}

/// Link-state advertisement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsaBody {
    /// Originating node.
    pub origin: Callsign,
    /// Monotonically increasing sequence number for `origin`.
    pub sequence: u64,
    /// Neighbors the origin advertises, with link cost.
    pub links: Vec<LinkCost>,
}

/// Route discovery request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDiscoveryBody {
    /// Node that initiated the discovery.
    pub source: Callsign,
    /// Destination being searched for.
    pub destination: Callsign,
    /// Path accumulated so far (starts as `[source]`).
    pub path: Vec<Callsign>,
    /// Sequence number, unique per discovery initiated by `source`.
    pub sequence: u64,
}

/// Route discovery reply body, sent back along the discovered path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteReplyBody {
    /// Node that initiated the original discovery.
    pub source: Callsign,
    /// Destination that was found.
    pub destination: Callsign,
    /// Full path from `source` to `destination`.
    pub path: Vec<Callsign>,
    /// Sequence number matching the originating [`RouteDiscoveryBody`].
    pub sequence: u64,
}

/// `AUTH_REQUEST` body: initiator announces its identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequestBody {
    /// Ed25519 public key, raw 32 bytes.
    pub public_key: [u8; 32],
    /// Signature algorithm identifier (always `"ed25519"` today).
    pub algorithm: String,
}

/// `AUTH_CHALLENGE` body: responder's random challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallengeBody {
    /// 32 random bytes to be signed by the initiator.
    pub challenge: [u8; 32],
}

/// `AUTH_RESPONSE` body: initiator's signature over the challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponseBody {
    /// The challenge being answered (echoed back for correlation).
    pub challenge: [u8; 32],
    /// Ed25519 signature over `challenge`, raw 64 bytes.
    pub signature: [u8; 64],
}

/// `AUTH_FAILURE` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailureBody {
    /// Human-readable rejection reason (e.g. `"signature-invalid"`,
    /// `"nonce-reused"`, `"stale-timestamp"`).
    pub reason: String,
}

/// Application data delivered end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBody {
    /// The carried payload.
    pub payload: Payload,
}

/// Variant-specific message body, adjacently tagged by `type`/`data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageBody {
    /// Link-state advertisement.
    Lsa(LsaBody),
    /// Route discovery broadcast.
    RouteDiscovery(RouteDiscoveryBody),
    /// Route discovery reply.
    RouteReply(RouteReplyBody),
    /// Step 1 of the auth handshake.
    AuthRequest(AuthRequestBody),
    /// Step 2 of the auth handshake.
    AuthChallenge(AuthChallengeBody),
    /// Step 3 of the auth handshake.
    AuthResponse(AuthResponseBody),
    /// Step 4 (success) of the auth handshake.
    AuthSuccess,
    /// Step 4 (failure) of the auth handshake.
    AuthFailure(AuthFailureBody),
    /// End-to-end application data.
    Data(DataBody),
}

/// A complete control message: envelope fields plus a tagged body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Sending node.
    pub from: Callsign,
    /// Intended recipient (direct neighbor on the overlay link).
    pub to: Callsign,
    /// Sender's wall-clock timestamp, Unix milliseconds.
    pub timestamp: i64,
    /// Replay-protection nonce; present on auth-handshake messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<[u8; 16]>,
    /// Variant-specific body.
    #[serde(flatten)]
    pub body: MessageBody,
}

impl ControlMessage {
    /// Serializes this message to a JSON byte string, the on-wire format for
    /// all backbone control traffic.
    ///
    /// # Errors
    ///
    /// Never fails for a well-formed `ControlMessage` constructed through
    /// this crate's public API; the `Result` exists because
    /// `serde_json::Error` is the underlying failure type.
    pub fn to_json(&self) -> Result<Vec<u8>, ProtoError> {
        serde_json::to_vec(self).map_err(|e| ProtoError::InvalidControlMessage(e.to_string()))
    }

    /// Deserializes a control message from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtoError::InvalidControlMessage`] if the bytes are not
    /// valid JSON, are missing a required envelope field, or carry an
    /// unrecognized `type` tag.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtoError> {
        serde_json::from_slice(bytes).map_err(|e| ProtoError::InvalidControlMessage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs(s: &str) -> Callsign {
        s.parse().unwrap()
    }

    #[test]
    fn lsa_round_trips_through_json() {
        let msg = ControlMessage {
            from: cs("N0CALL"),
            to: cs("N1CALL"),
            timestamp: 1234,
            nonce: None,
            body: MessageBody::Lsa(LsaBody {
                origin: cs("N0CALL"),
                sequence: 7,
                links: vec![LinkCost { neighbor: cs("N1CALL"), cost: 1 }],
            }),
        };
        let json = msg.to_json().unwrap();
        assert!(String::from_utf8_lossy(&json).contains("\"type\":\"lsa\""));
        let back = ControlMessage::from_json(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn unit_variant_round_trips() {
        let msg = ControlMessage {
            from: cs("N0CALL"),
            to: cs("N1CALL"),
            timestamp: 1,
            nonce: Some([7u8; 16]),
            body: MessageBody::AuthSuccess,
        };
        let json = msg.to_json().unwrap();
        let back = ControlMessage::from_json(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn rejects_garbage() {
        assert!(ControlMessage::from_json(b"not json").is_err());
    }
}

//! Unified payload shape for data carried over the backbone.
//!
//! The upstream source passes `Buffer`s, arrays, and strings interchangeably
//! for message bodies; this crate unifies that on entry into a single tagged
//! variant so every downstream consumer only ever handles [`Payload::Bytes`].

use serde::{Deserialize, Serialize};

/// A payload is either raw bytes or UTF-8 text. Parsers normalize to this
/// shape immediately; all core logic consumes [`Payload::Bytes`] via
/// [`Payload::into_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTF-8 text, carried as text on the wire for readability.
    Text(String),
}

impl Payload {
    /// Normalizes to owned bytes, encoding text as UTF-8.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b,
            Self::Text(s) => s.into_bytes(),
        }
    }

    /// Borrowed byte view, encoding text as UTF-8 on demand.
    #[must_use]
    pub fn as_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self {
            Self::Bytes(b) => std::borrow::Cow::Borrowed(b),
            Self::Text(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
        }
    }

    /// Byte length of the normalized payload, used for QoS token-bucket
    /// accounting.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Bytes(b) => b.len(),
            Self::Text(s) => s.len(),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_bytes_agree_on_size() {
        let text = Payload::Text("hello".to_string());
        let bytes = Payload::Bytes(b"hello".to_vec());
        assert_eq!(text.size(), bytes.size());
        assert_eq!(text.into_bytes(), bytes.into_bytes());
    }

    #[test]
    fn serde_round_trip_tags_variant() {
        let p = Payload::Text("hi".to_string());
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"kind\":\"text\""));
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}

//! Byte payload encodings.
//!
//! Tunnel clients written against Node-style runtimes emit bytes in several
//! JSON shapes. All of them are accepted on the way in; on the way out the
//! relay picks the most compact lossless one.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Accepted JSON shapes for a byte payload.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireBytes {
    Text(String),
    Raw(Vec<u8>),
    /// `{"type": "Buffer", "data": [..]}`
    Buffer { data: Vec<u8> },
}

impl From<WireBytes> for Vec<u8> {
    fn from(wire: WireBytes) -> Self {
        match wire {
            WireBytes::Text(text) => text.into_bytes(),
            WireBytes::Raw(bytes) | WireBytes::Buffer { data: bytes } => bytes,
        }
    }
}

/// A fully buffered HTTP body carried inside a JSON frame.
///
/// Serializes as a string when the bytes are valid UTF-8 and as an array of
/// byte values otherwise. Deserializes from a string, a byte array, a
/// `Buffer` object, or null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyBytes(pub Vec<u8>);

impl BodyBytes {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for BodyBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for BodyBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => self.0.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for BodyBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Option::<WireBytes>::deserialize(deserializer)?;
        Ok(Self(wire.map(Vec::from).unwrap_or_default()))
    }
}

/// One data frame of a proxied WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketData {
    Text(String),
    Binary(Vec<u8>),
}

impl SocketData {
    /// Interpret the `data` field of a socket frame.
    ///
    /// Strings stay text, byte encodings become binary, and any other JSON
    /// value is forwarded as its serialized text.
    pub fn from_json(value: &Value) -> Self {
        if let Value::String(text) = value {
            return Self::Text(text.clone());
        }
        match serde_json::from_value::<WireBytes>(value.clone()) {
            Ok(wire) => Self::Binary(wire.into()),
            Err(_) => Self::Text(value.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

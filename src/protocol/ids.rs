//! Identifier newtypes used on the wire.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters allowed in a tunnel key. Lowercase only, so the key survives
/// browsers lowercasing the Host header.
const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Correlation id pairing a relay request with the client's reply.
    ReqId
);

string_id!(
    /// Identifier of a public WebSocket tunneled through a control connection.
    WsId
);

string_id!(
    /// Routing key ("hash") under which a control connection is registered.
    TunnelKey
);

impl ReqId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl WsId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl std::borrow::Borrow<str> for TunnelKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TunnelKey {
    /// Draw a random key of `len` lowercase alphanumeric characters.
    pub fn generate(len: usize) -> Self {
        let mut rng = rand::thread_rng();
        let key = (0..len)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect();
        Self(key)
    }
}

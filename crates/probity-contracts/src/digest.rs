//! The 256-bit digest type used for payload, entry, and checkpoint hashes.
//!
//! Digests serialize as lowercase 64-character hex strings so that stored
//! entries stay readable and match the `auditHash` values exposed to donors.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A SHA-256 output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Byte length of every digest.
    pub const LEN: usize = 32;

    /// The `prev_digest` of sequence 0 on every chain.
    ///
    /// All-zero bytes: no real SHA-256 output is expected to equal it, so a
    /// genesis link can never be confused with a link to a real entry.
    pub const GENESIS: Digest = Digest([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_genesis(&self) -> bool {
        *self == Self::GENESIS
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// First eight hex characters, for log lines and CLI output.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(|e| de::Error::custom(format!("invalid digest '{s}': {e}")))
    }
}

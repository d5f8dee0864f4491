use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::crypto::{CryptoError, PublicKey};

/// A logical pub/sub topic named by a hex string.
///
/// Direct channels carry a user's public key; sending to one encrypts for
/// that key. Stored lowercase without a `0x` prefix so set membership is
/// exact.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: &str) -> Result<Self, CryptoError> {
        let name = name.strip_prefix("0x").unwrap_or(name).to_ascii_lowercase();
        if name.is_empty() {
            return Err(CryptoError::InvalidLength {
                what: "channel",
                expected: 1,
                got: 0,
            });
        }
        if hex::decode(&name).is_err() {
            return Err(CryptoError::InvalidHex("channel"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw topic bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // validated in `new`
        hex::decode(&self.0).unwrap_or_default()
    }

    /// The identity this channel addresses.
    pub fn public_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_hex(&self.0)
    }
}

impl From<PublicKey> for Channel {
    fn from(key: PublicKey) -> Self {
        Self(key.to_hex())
    }
}

impl From<&PublicKey> for Channel {
    fn from(key: &PublicKey) -> Self {
        Self(key.to_hex())
    }
}

impl FromStr for Channel {
    type Err = CryptoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Channel::new(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn test_channel_normalizes_case_and_prefix() {
        let a = Channel::new("0xABCD").unwrap();
        let b = Channel::new("abcd").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_bytes(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_channel_rejects_non_hex() {
        assert!(Channel::new("hello").is_err());
        assert!(Channel::new("").is_err());
        assert!(serde_json::from_str::<Channel>("\"xyz\"").is_err());
    }

    #[test]
    fn test_channel_from_public_key() {
        let key = SecretKey::from_hex(&"11".repeat(32)).unwrap().public();
        let channel = Channel::from(key);
        assert_eq!(channel.public_key().unwrap(), key);
    }
}

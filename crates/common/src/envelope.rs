use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::crypto::{CryptoError, Iv, PublicKey, SecretKey};

/// The encrypted wire message both transports carry.
///
/// ```json
/// {"senderPublicKey": "<hex>", "iv": "<hex>", "message": "<hex ciphertext>"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub sender_public_key: String,
    pub iv: Iv,
    pub message: String,
}

impl EncryptedEnvelope {
    /// Encrypt `plaintext` for the identity behind `channel`.
    pub fn seal(sender: &SecretKey, channel: &Channel, plaintext: &[u8]) -> Result<Self, CryptoError> {
        let recipient = channel.public_key()?;
        let key = sender.shared_key(&recipient)?;
        let (ciphertext, iv) = key.encrypt(plaintext)?;
        Ok(Self {
            sender_public_key: sender.public().to_hex(),
            iv,
            message: hex::encode(ciphertext),
        })
    }

    /// Decrypt with the key shared between `recipient` and the declared sender.
    pub fn open(&self, recipient: &SecretKey) -> Result<(PublicKey, Vec<u8>), CryptoError> {
        let sender = PublicKey::from_hex(&self.sender_public_key)?;
        let ciphertext =
            hex::decode(&self.message).map_err(|_| CryptoError::InvalidHex("ciphertext"))?;
        let key = recipient.shared_key(&sender)?;
        let plaintext = key.decrypt(&ciphertext, &self.iv)?;
        Ok((sender, plaintext))
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (SecretKey, SecretKey) {
        (
            SecretKey::from_hex(&"11".repeat(32)).unwrap(),
            SecretKey::from_hex(&"22".repeat(32)).unwrap(),
        )
    }

    #[test]
    fn test_seal_and_open() {
        let (alice, bob) = keys();
        let channel = Channel::from(bob.public());

        let envelope = EncryptedEnvelope::seal(&alice, &channel, b"{\"hello\":1}").unwrap();
        let bytes = envelope.to_vec().unwrap();
        let parsed = EncryptedEnvelope::from_slice(&bytes).unwrap();

        let (sender, plaintext) = parsed.open(&bob).unwrap();
        assert_eq!(sender, alice.public());
        assert_eq!(plaintext, b"{\"hello\":1}");
    }

    #[test]
    fn test_wire_field_names() {
        let (alice, bob) = keys();
        let envelope = EncryptedEnvelope::seal(&alice, &Channel::from(bob.public()), b"x").unwrap();
        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("senderPublicKey").is_some());
        assert!(value.get("iv").and_then(|v| v.as_str()).is_some());
        assert!(value.get("message").is_some());
    }

    #[test]
    fn test_third_party_cannot_open() {
        let (alice, bob) = keys();
        let eve = SecretKey::from_hex(&"33".repeat(32)).unwrap();
        let envelope = EncryptedEnvelope::seal(&alice, &Channel::from(bob.public()), b"x").unwrap();
        assert!(matches!(envelope.open(&eve), Err(CryptoError::Decryption)));
    }
}

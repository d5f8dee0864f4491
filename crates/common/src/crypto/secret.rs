//! Symmetric message encryption with AES-256-GCM
//!
//! Every call to [`SharedKey::encrypt`] draws a fresh random nonce (the
//! envelope's `iv`). The GCM tag authenticates the ciphertext, so a wrong
//! key, wrong iv or tampered body all surface as [`CryptoError::Decryption`].

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{decode_hex, CryptoError};

/// Size of the AES-GCM nonce in bytes
pub const IV_SIZE: usize = 12;
/// Size of the AES-256 key in bytes
pub const SHARED_KEY_SIZE: usize = 32;

/// A symmetric key agreed between two identities.
#[derive(PartialEq, Eq, Clone)]
pub struct SharedKey([u8; SHARED_KEY_SIZE]);

impl From<[u8; SHARED_KEY_SIZE]> for SharedKey {
    fn from(bytes: [u8; SHARED_KEY_SIZE]) -> Self {
        SharedKey(bytes)
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}

impl SharedKey {
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        decode_hex::<SHARED_KEY_SIZE>("shared key", hex).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }

    /// Encrypt `plaintext` under a freshly generated iv.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Iv), CryptoError> {
        let iv = Iv::generate()?;
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&iv.0), plaintext)
            .map_err(|_| CryptoError::Encryption)?;
        Ok((ciphertext, iv))
    }

    /// Decrypt and authenticate `ciphertext` produced by [`SharedKey::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8], iv: &Iv) -> Result<Vec<u8>, CryptoError> {
        self.cipher()
            .decrypt(Nonce::from_slice(&iv.0), ciphertext)
            .map_err(|_| CryptoError::Decryption)
    }
}

/// Per-message nonce, hex encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Iv([u8; IV_SIZE]);

impl Iv {
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; IV_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::Rng(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        decode_hex::<IV_SIZE>("iv", hex).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}

impl From<[u8; IV_SIZE]> for Iv {
    fn from(bytes: [u8; IV_SIZE]) -> Self {
        Iv(bytes)
    }
}

impl Serialize for Iv {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Iv {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Iv::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key() -> SharedKey {
        SharedKey::from([7u8; SHARED_KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (ciphertext, iv) = key().encrypt(b"sensitive data").unwrap();
        let recovered = key().decrypt(&ciphertext, &iv).unwrap();
        assert_eq!(recovered, b"sensitive data");
    }

    #[test]
    fn test_wrong_iv_fails() {
        let (ciphertext, _) = key().encrypt(b"sensitive data").unwrap();
        let other_iv = Iv::from([0u8; IV_SIZE]);
        assert!(matches!(
            key().decrypt(&ciphertext, &other_iv),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (mut ciphertext, iv) = key().encrypt(b"sensitive data").unwrap();
        ciphertext[0] ^= 0x01;
        assert!(matches!(
            key().decrypt(&ciphertext, &iv),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_iv_serializes_as_hex() {
        let iv = Iv::from([0xabu8; IV_SIZE]);
        let json = serde_json::to_string(&iv).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(IV_SIZE)));
        let back: Iv = serde_json::from_str(&json).unwrap();
        assert_eq!(back, iv);
    }
}

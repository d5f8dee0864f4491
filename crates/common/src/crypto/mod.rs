//! Cryptographic primitives for HexHoot messaging
//!
//! - **Identity**: Ed25519 keypairs (`SecretKey`/`PublicKey`). The public key
//!   is both the user's address and the channel used to reach them.
//! - **Key agreement**: X25519 over the Montgomery form of both identity
//!   keys, normalized through public-key derivation into a [`SharedKey`].
//!   `shared_key(a, B) == shared_key(b, A)` for every pair.
//! - **Encryption**: AES-256-GCM with a random 96-bit iv per message.
//! - **Signatures**: Ed25519 over the SHA-512 digest of the message.
//!
//! The free functions at the bottom of this module speak hex strings, which
//! is how keys travel through profiles, storage and the control API.
//!
//! Private keys are 64 hex characters (32 bytes) and public keys are 64 hex
//! characters as well. Older HexHoot identities with 32-hex private keys on
//! a different curve are not accepted; generate a new identity with
//! `hexhoot keygen` or `hexhoot init`.

mod keys;
mod secret;

pub use ed25519_dalek::Signature;
pub use keys::{PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use secret::{Iv, SharedKey, IV_SIZE, SHARED_KEY_SIZE};

/// Errors that can occur during key handling, encryption and signing
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid hex encoding for {0}")]
    InvalidHex(&'static str),
    #[error("invalid {what} length: expected {expected} bytes, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("key is not a valid curve point")]
    InvalidPoint,
    #[error("invalid PEM: {0}")]
    InvalidPem(String),
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed: key/iv mismatch or corrupted ciphertext")]
    Decryption,
    #[error("decrypted payload is not valid utf-8")]
    Utf8,
    #[error("system randomness unavailable: {0}")]
    Rng(String),
}

pub(crate) fn decode_hex<const N: usize>(
    what: &'static str,
    hex: &str,
) -> Result<[u8; N], CryptoError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let bytes = hex::decode(hex).map_err(|_| CryptoError::InvalidHex(what))?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        what,
        expected: N,
        got,
    })
}

/// Fresh private key, hex encoded.
pub fn generate_private_key() -> Result<String, CryptoError> {
    Ok(SecretKey::generate()?.to_hex())
}

pub fn public_key_from_private(private_key: &str) -> Result<String, CryptoError> {
    Ok(SecretKey::from_hex(private_key)?.public().to_hex())
}

/// Symmetric key shared between `private_key`'s owner and `public_key`'s owner.
pub fn shared_key(private_key: &str, public_key: &str) -> Result<String, CryptoError> {
    let secret = SecretKey::from_hex(private_key)?;
    let public = PublicKey::from_hex(public_key)?;
    Ok(secret.shared_key(&public)?.to_hex())
}

/// Returns the hex ciphertext together with the iv it was sealed under.
pub fn encrypt(plaintext: &str, shared_key: &str) -> Result<(String, Iv), CryptoError> {
    let key = SharedKey::from_hex(shared_key)?;
    let (ciphertext, iv) = key.encrypt(plaintext.as_bytes())?;
    Ok((hex::encode(ciphertext), iv))
}

pub fn decrypt(ciphertext: &str, shared_key: &str, iv: &Iv) -> Result<String, CryptoError> {
    let key = SharedKey::from_hex(shared_key)?;
    let ciphertext = hex::decode(ciphertext.strip_prefix("0x").unwrap_or(ciphertext))
        .map_err(|_| CryptoError::InvalidHex("ciphertext"))?;
    let plaintext = key.decrypt(&ciphertext, iv)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}

/// Hex encoded signature over the SHA-512 digest of `message`.
pub fn sign(private_key: &str, message: &[u8]) -> Result<String, CryptoError> {
    let secret = SecretKey::from_hex(private_key)?;
    Ok(hex::encode(secret.sign(message).to_bytes()))
}

pub fn verify(public_key: &str, message: &[u8], signature: &str) -> Result<bool, CryptoError> {
    let public = PublicKey::from_hex(public_key)?;
    let bytes = decode_hex::<SIGNATURE_SIZE>("signature", signature)?;
    public.verify(message, &Signature::from_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> String {
        "11".repeat(PRIVATE_KEY_SIZE)
    }

    fn bob() -> String {
        "22".repeat(PRIVATE_KEY_SIZE)
    }

    #[test]
    fn test_shared_key_is_symmetric() {
        let alice_pub = public_key_from_private(&alice()).unwrap();
        let bob_pub = public_key_from_private(&bob()).unwrap();

        let from_alice = shared_key(&alice(), &bob_pub).unwrap();
        let from_bob = shared_key(&bob(), &alice_pub).unwrap();
        assert_eq!(from_alice, from_bob);
        assert_eq!(from_alice.len(), SHARED_KEY_SIZE * 2);
    }

    #[test]
    fn test_shared_key_is_symmetric_for_random_pairs() {
        for _ in 0..16 {
            let a = generate_private_key().unwrap();
            let b = generate_private_key().unwrap();
            let a_pub = public_key_from_private(&a).unwrap();
            let b_pub = public_key_from_private(&b).unwrap();
            assert_eq!(
                shared_key(&a, &b_pub).unwrap(),
                shared_key(&b, &a_pub).unwrap()
            );
        }
    }

    #[test]
    fn test_round_trip() {
        let bob_pub = public_key_from_private(&bob()).unwrap();
        let key = shared_key(&alice(), &bob_pub).unwrap();

        for plaintext in ["", "hi", "{\"type\":\"ChatMessage\"}", "ünïcødé ✓"] {
            let (ciphertext, iv) = encrypt(plaintext, &key).unwrap();
            assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_iv_is_fresh_per_call() {
        let bob_pub = public_key_from_private(&bob()).unwrap();
        let key = shared_key(&alice(), &bob_pub).unwrap();

        let (c1, iv1) = encrypt("same message", &key).unwrap();
        let (c2, iv2) = encrypt("same message", &key).unwrap();
        assert_ne!(iv1, iv2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let bob_pub = public_key_from_private(&bob()).unwrap();
        let key = shared_key(&alice(), &bob_pub).unwrap();
        let (ciphertext, iv) = encrypt("secret", &key).unwrap();

        let other = "33".repeat(SHARED_KEY_SIZE);
        assert!(matches!(
            decrypt(&ciphertext, &other, &iv),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn test_malformed_inputs_fail_fast() {
        assert!(matches!(
            public_key_from_private("not hex"),
            Err(CryptoError::InvalidHex(_))
        ));
        assert!(matches!(
            public_key_from_private(&"11".repeat(16)),
            Err(CryptoError::InvalidLength { got: 16, .. })
        ));
        assert!(matches!(
            shared_key(&alice(), "abcd"),
            Err(CryptoError::InvalidLength { .. })
        ));
        assert!(matches!(
            encrypt("m", "zz"),
            Err(CryptoError::InvalidHex(_))
        ));
        let iv = Iv::from([0u8; IV_SIZE]);
        assert!(matches!(
            decrypt("xyz", &"11".repeat(32), &iv),
            Err(CryptoError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_sign_verify_hex() {
        let alice_pub = public_key_from_private(&alice()).unwrap();
        let signature = sign(&alice(), b"profile update").unwrap();
        assert_eq!(signature.len(), SIGNATURE_SIZE * 2);

        assert!(verify(&alice_pub, b"profile update", &signature).unwrap());
        assert!(!verify(&alice_pub, b"profile updates", &signature).unwrap());
        assert!(verify(&alice_pub, b"profile update", "00").is_err());
    }
}

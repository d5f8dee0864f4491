use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;
use iroh::{PublicKey as PPublicKey, SecretKey as SSecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use super::secret::SharedKey;
use super::{decode_hex, CryptoError};

/// Size of Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Public half of a user identity.
///
/// Doubles as the user's address on the network and as the name of the
/// channel used to reach them directly.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Copy)]
pub struct PublicKey(PPublicKey);

impl Deref for PublicKey {
    type Target = PPublicKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<PPublicKey> for PublicKey {
    fn from(key: PPublicKey) -> Self {
        PublicKey(key)
    }
}

impl From<PublicKey> for PPublicKey {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = CryptoError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidLength {
                what: "public key",
                expected: PUBLIC_KEY_SIZE,
                got: bytes.len(),
            })?;
        let key = PPublicKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPoint)?;
        Ok(PublicKey(key))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex::<PUBLIC_KEY_SIZE>("public key", hex)?;
        Self::try_from(&bytes[..])
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.0.as_bytes()
    }

    /// Convert public key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Map the Ed25519 point onto the Montgomery curve for X25519 agreement.
    #[allow(clippy::wrong_self_convention)]
    pub(crate) fn to_x25519(&self) -> Result<X25519PublicKey, CryptoError> {
        let edwards_point = CompressedEdwardsY::from_slice(&self.to_bytes())
            .map_err(|_| CryptoError::InvalidPoint)?
            .decompress()
            .ok_or(CryptoError::InvalidPoint)?;

        let montgomery_point = edwards_point.to_montgomery();
        Ok(X25519PublicKey::from(montgomery_point.to_bytes()))
    }

    /// Verify a signature produced by [`SecretKey::sign`].
    ///
    /// The signature covers the SHA-512 digest of `msg`. A well-formed
    /// signature that does not match yields `Ok(false)`.
    pub fn verify(
        &self,
        msg: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<bool, CryptoError> {
        let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&self.to_bytes())
            .map_err(|_| CryptoError::InvalidPoint)?;
        let digest = Sha512::digest(msg);
        Ok(verifying_key.verify_strict(&digest, signature).is_ok())
    }
}

/// Private half of a user identity.
///
/// Never leaves the machine; the daemon keeps it PEM-encoded in its state
/// directory.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretKey(pub SSecretKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SSecretKey::from_bytes(&secret))
    }
}

impl Deref for SecretKey {
    type Target = SSecretKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(public: {})", self.public().to_hex())
    }
}

impl SecretKey {
    /// Parse a secret key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings. The key is a
    /// 32-byte Ed25519 seed, so exactly 64 hex characters. Shorter 16-byte
    /// keys from older HexHoot clients are rejected with
    /// [`CryptoError::InvalidLength`] and cannot be imported.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex::<PRIVATE_KEY_SIZE>("private key", hex)?;
        Ok(Self::from(bytes))
    }

    /// Generate a new random secret key using the OS RNG
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::Rng(e.to_string()))?;
        Ok(Self::from(bytes))
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.public())
    }

    /// Convert secret key to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Convert secret key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encode secret key in PEM format for storage
    ///
    /// Returns a PEM-encoded string with tag "PRIVATE KEY".
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new("PRIVATE KEY", self.to_bytes());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "PRIVATE KEY"
    /// - The key size is incorrect
    pub fn from_pem(pem_str: &str) -> Result<Self, CryptoError> {
        let pem = pem::parse(pem_str).map_err(|e| CryptoError::InvalidPem(e.to_string()))?;

        if pem.tag() != "PRIVATE KEY" {
            return Err(CryptoError::InvalidPem(format!(
                "unexpected tag {}",
                pem.tag()
            )));
        }

        let bytes: [u8; PRIVATE_KEY_SIZE] =
            pem.contents()
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    what: "private key",
                    expected: PRIVATE_KEY_SIZE,
                    got: pem.contents().len(),
                })?;
        Ok(Self::from(bytes))
    }

    /// X25519 scalar for this key: the lower half of SHA-512(seed), the same
    /// expansion Ed25519 uses for its signing scalar.
    pub(crate) fn to_x25519(&self) -> StaticSecret {
        let expanded = Sha512::digest(self.to_bytes());
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&expanded[..32]);
        StaticSecret::from(scalar)
    }

    /// Derive the symmetric key shared with `other`.
    ///
    /// Runs X25519 on the Montgomery forms of both keys, then feeds the raw
    /// agreement back through public-key derivation so both sides land on the
    /// same 32 bytes no matter who computes it.
    pub fn shared_key(&self, other: &PublicKey) -> Result<SharedKey, CryptoError> {
        let theirs = other.to_x25519()?;
        let agreement = self.to_x25519().diffie_hellman(&theirs);
        if !agreement.was_contributory() {
            return Err(CryptoError::InvalidPoint);
        }
        let normalized = SecretKey::from(*agreement.as_bytes()).public();
        Ok(SharedKey::from(normalized.to_bytes()))
    }

    /// Sign the SHA-512 digest of `msg`.
    pub fn sign(&self, msg: &[u8]) -> ed25519_dalek::Signature {
        let digest = Sha512::digest(msg);
        // iroh pins its own ed25519 release; both share the 64-byte encoding
        let sig = self.0.sign(&digest);
        ed25519_dalek::Signature::from_bytes(&sig.to_bytes())
    }
}

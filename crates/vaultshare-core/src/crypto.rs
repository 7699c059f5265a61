//! Cryptographic value types for VaultShare.
//!
//! Wraps Ed25519 signing with strong types and describes the inputs of the
//! per-file key derivation. Nothing here derives a key; that lives in the
//! perms crate next to the cipher.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Length of a key-derivation salt in bytes.
pub const SALT_LEN: usize = 16;

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
///
/// Signatures only travel inside share tokens, as hex.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CoreError::DecodingError("signature must be 64 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

/// A signing keypair.
///
/// Share tokens are signed with a keypair derived from a master secret, so
/// the seed is as sensitive as the secret itself.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Identifies one master secret inside a versioned registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretId(pub u32);

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A random per-derivation salt.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    /// Draw a fresh salt from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

// Salts are not secret, but they have no business in logs either.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl KdfParams {
    /// Create and validate a parameter set.
    pub fn new(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self> {
        let params = Self {
            memory_kib,
            iterations,
            lanes,
        };
        params.validate()?;
        Ok(params)
    }

    /// The cheapest parameters Argon2 accepts.
    ///
    /// Offers no brute-force resistance. Only for tests.
    pub const fn insecure_minimum() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            lanes: 1,
        }
    }

    /// Check the parameters against Argon2's limits.
    pub fn validate(&self) -> Result<()> {
        if self.lanes == 0 {
            return Err(CoreError::InvalidKdfParams("lanes must be at least 1".into()));
        }
        if self.iterations == 0 {
            return Err(CoreError::InvalidKdfParams(
                "iterations must be at least 1".into(),
            ));
        }
        if self.memory_kib < 8 * self.lanes {
            return Err(CoreError::InvalidKdfParams(format!(
                "memory must be at least 8 KiB per lane ({} KiB for {} lanes)",
                8 * self.lanes,
                self.lanes
            )));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    /// OWASP's Argon2id baseline: 19 MiB, two passes, one lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            lanes: 1,
        }
    }
}

/// Everything needed to re-derive one content key, minus the secret itself.
///
/// Generated exactly once per file version and never copied to another
/// entity. Recording the secret id and cost parameters next to the salt lets
/// the master secret rotate and the parameters change without stranding
/// older ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    /// Which registry secret the key was derived from.
    pub secret_id: SecretId,
    /// The random salt.
    pub salt: Salt,
    /// The cost parameters used.
    pub kdf: KdfParams,
}

impl KeyMaterial {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let signature = keypair.sign(b"hello world");

        keypair
            .public_key()
            .verify(b"hello world", &signature)
            .expect("valid signature should verify");

        assert!(keypair.public_key().verify(b"hello worlD", &signature).is_err());
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let keypair = Keypair::from_seed(&[0x07; 32]);
        let signature = keypair.sign(b"msg");
        let recovered = Ed25519Signature::from_hex(&signature.to_hex()).unwrap();
        assert_eq!(signature, recovered);
        assert_eq!(signature.to_hex().len(), 128);

        assert!(Ed25519Signature::from_hex(&"ab".repeat(63)).is_err());
        assert!(Ed25519Signature::from_hex("not hex").is_err());
    }

    #[test]
    fn test_random_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn test_kdf_params_validation() {
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::insecure_minimum().validate().is_ok());
        assert!(KdfParams::new(8, 0, 1).is_err());
        assert!(KdfParams::new(8, 1, 0).is_err());
        assert!(KdfParams::new(15, 1, 2).is_err());
    }

    #[test]
    fn test_key_material_cbor_roundtrip() {
        let material = KeyMaterial {
            secret_id: SecretId(3),
            salt: Salt::from_bytes([9; SALT_LEN]),
            kdf: KdfParams::default(),
        };
        let bytes = material.to_bytes().unwrap();
        assert_eq!(KeyMaterial::from_bytes(&bytes).unwrap(), material);
    }

    #[test]
    fn test_salt_debug_hides_bytes() {
        let salt = Salt::from_bytes([0xab; SALT_LEN]);
        assert!(!format!("{:?}", salt).contains("ab"));
    }
}

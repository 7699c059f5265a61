//! Symmetric content cipher.
//!
//! ChaCha20-Poly1305 with in-place encryption: the plaintext buffer becomes
//! the ciphertext buffer, so a seal or open never holds both copies.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use vaultshare_core::NONCE_LEN;

use crate::error::{PermsError, Result};

/// Authentication tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// A 256-bit symmetric content key. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt `buffer` in place, appending the tag.
    pub fn encrypt(
        &self,
        mut buffer: Vec<u8>,
        nonce: &EncryptionNonce,
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;

        cipher
            .encrypt_in_place(Nonce::from_slice(&nonce.0), aad, &mut buffer)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?;
        Ok(buffer)
    }

    /// Decrypt `buffer` in place, verifying and stripping the tag.
    ///
    /// Any authentication failure is [`PermsError::Integrity`].
    pub fn decrypt(
        &self,
        mut buffer: Vec<u8>,
        nonce: &EncryptionNonce,
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let cipher =
            ChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| PermsError::Integrity)?;

        cipher
            .decrypt_in_place(Nonce::from_slice(&nonce.0), aad, &mut buffer)
            .map_err(|_| PermsError::Integrity)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionNonce(pub [u8; NONCE_LEN]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

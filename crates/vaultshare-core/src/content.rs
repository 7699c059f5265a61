//! Sealed content blobs.
//!
//! A [`SealedBlob`] is what actually lands in storage: ciphertext with its
//! authentication tag, the nonce, and a format tag. Sealing and opening are
//! done by the perms crate.

use serde::{Deserialize, Serialize};

/// Nonce length for the content cipher.
pub const NONCE_LEN: usize = 12;

/// Format identifier for sealed blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with a 256-bit key and the blob id as associated data.
    ChaCha20Poly1305 = 1,
}

impl EncryptionFormat {
    /// Numeric tag used in storage.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric tag.
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }
}

/// An encrypted payload as persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    /// Cipher used.
    pub format: EncryptionFormat,
    /// Nonce used for this blob (unique per seal).
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Size of the ciphertext in bytes.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}

impl std::fmt::Debug for SealedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBlob")
            .field("format", &self.format)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

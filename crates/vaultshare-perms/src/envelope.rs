//! Sealing and opening file content.
//!
//! Every piece of content gets its own key material and a fresh nonce. The
//! blob id is bound in as associated data, so a ciphertext copied under
//! another blob id fails to open.

use std::sync::Arc;

use vaultshare_core::{BlobId, EncryptionFormat, KdfParams, KeyMaterial, SealedBlob};

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::Result;
use crate::kdf::SecretRegistry;

/// Encrypt `plaintext` with `key`, binding `aad`.
pub fn seal(plaintext: Vec<u8>, key: &EncryptionKey, aad: &[u8]) -> Result<SealedBlob> {
    let nonce = EncryptionNonce::generate();
    let ciphertext = key.encrypt(plaintext, &nonce, aad)?;

    Ok(SealedBlob {
        format: EncryptionFormat::ChaCha20Poly1305,
        nonce: *nonce.as_bytes(),
        ciphertext,
    })
}

/// Decrypt a sealed blob with `key`, checking `aad`.
pub fn open(blob: SealedBlob, key: &EncryptionKey, aad: &[u8]) -> Result<Vec<u8>> {
    match blob.format {
        EncryptionFormat::ChaCha20Poly1305 => {
            let nonce = EncryptionNonce::from_bytes(blob.nonce);
            key.decrypt(blob.ciphertext, &nonce, aad)
        }
    }
}

/// Seals new content under fresh key material and opens stored content.
///
/// Both operations are CPU-bound (Argon2 dominates); async callers should
/// run them on a blocking thread.
#[derive(Debug, Clone)]
pub struct ContentSealer {
    secrets: Arc<SecretRegistry>,
    kdf: KdfParams,
}

impl ContentSealer {
    /// Create a sealer over a shared secret registry.
    pub fn new(secrets: Arc<SecretRegistry>, kdf: KdfParams) -> Self {
        Self { secrets, kdf }
    }

    /// Seal `plaintext` for storage under `blob_id`.
    ///
    /// Returns the key material to persist alongside the version.
    pub fn seal_new(&self, plaintext: Vec<u8>, blob_id: &BlobId) -> Result<(KeyMaterial, SealedBlob)> {
        let (key, material) = self.secrets.generate_file_key(&self.kdf)?;
        let blob = seal(plaintext, &key, blob_id.as_bytes())?;
        Ok((material, blob))
    }

    /// Open content that was stored under `blob_id`.
    pub fn open(&self, material: &KeyMaterial, blob: SealedBlob, blob_id: &BlobId) -> Result<Vec<u8>> {
        let key = self.secrets.rederive(material)?;
        open(blob, &key, blob_id.as_bytes())
    }
}

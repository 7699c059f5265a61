//! Sealing and opening content off the async scheduler.
//!
//! Argon2 and the AEAD are CPU-bound, so both run on `spawn_blocking`.
//! Integrity failures are logged with the file id and version, never with
//! key material or plaintext.

use bytes::Bytes;

use vaultshare_core::{BlobId, ContentRef, FileId, SealedBlob};
use vaultshare_perms::PermsError;
use vaultshare_store::Store;

use crate::error::{Result, VaultError};
use crate::vault::Vault;

impl<S: Store> Vault<S> {
    /// Seal `plaintext` under fresh key material and a fresh blob id.
    pub(crate) async fn seal_content(&self, plaintext: Vec<u8>) -> Result<(ContentRef, SealedBlob)> {
        let sealer = self.sealer.clone();
        let blob_id = BlobId::generate();

        let (key, blob) =
            tokio::task::spawn_blocking(move || sealer.seal_new(plaintext, &blob_id)).await??;

        Ok((ContentRef { blob_id, key }, blob))
    }

    /// Fetch and open the content of `version` of `file_id`.
    pub(crate) async fn open_content(
        &self,
        file_id: &FileId,
        version: u32,
        content: &ContentRef,
    ) -> Result<Bytes> {
        let blob = self.store.get_blob(&content.blob_id).await?.ok_or_else(|| {
            tracing::error!(%file_id, version, "sealed content missing");
            VaultError::Internal
        })?;

        let sealer = self.sealer.clone();
        let key = content.key.clone();
        let blob_id = content.blob_id;
        let opened =
            tokio::task::spawn_blocking(move || sealer.open(&key, blob, &blob_id)).await?;

        match opened {
            Ok(plaintext) => Ok(Bytes::from(plaintext)),
            Err(PermsError::Integrity) => {
                tracing::error!(%file_id, version, "content failed integrity check");
                Err(VaultError::Integrity)
            }
            Err(PermsError::UnknownSecret(secret_id)) => {
                tracing::error!(%file_id, version, %secret_id, "key material names an unknown secret");
                Err(VaultError::Internal)
            }
            Err(other) => Err(VaultError::internal(other)),
        }
    }
}

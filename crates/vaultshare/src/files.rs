//! Upload, download and deletion of whole files.

use bytes::Bytes;

use vaultshare_core::{FileId, FileVersion, PermissionKind, StoredFile, UserId};
use vaultshare_store::Store;

use crate::error::{Result, VaultError};
use crate::events::VaultEvent;
use crate::vault::Vault;

/// Comment on the version an upload creates.
pub const INITIAL_UPLOAD_COMMENT: &str = "initial upload";

impl<S: Store> Vault<S> {
    /// Upload a new file owned by `owner`.
    ///
    /// Name, size and type are checked before any key derivation happens.
    /// The file is created with version 1.
    pub async fn upload(
        &self,
        owner: UserId,
        name: &str,
        content_type: &str,
        data: impl Into<Vec<u8>>,
    ) -> Result<StoredFile> {
        let data = data.into();
        self.config.validate_upload(name, content_type, data.len())?;

        let size = data.len() as u64;
        let (content, blob) = self.seal_content(data).await?;
        let now = self.now();

        let file = StoredFile {
            id: FileId::generate(),
            name: name.to_string(),
            owner,
            content_type: content_type.to_string(),
            size,
            created_at: now,
            current_version: 1,
            content: content.clone(),
        };
        let first = FileVersion {
            file_id: file.id,
            number: 1,
            content,
            size,
            created_by: owner,
            created_at: now,
            comment: INITIAL_UPLOAD_COMMENT.to_string(),
        };

        self.store.insert_file(&file, &first, &blob).await?;

        tracing::info!(file_id = %file.id, user = %owner, size, "file uploaded");
        Ok(file)
    }

    /// Download the current version of a file. Requires READ.
    pub async fn download(&self, file_id: &FileId, requester: UserId) -> Result<Bytes> {
        let file = self.file_for(file_id, requester, PermissionKind::Read).await?;

        tracing::debug!(file_id = %file.id, user = %requester, version = file.current_version, "download");
        self.open_content(&file.id, file.current_version, &file.content)
            .await
    }

    /// Metadata of a file as seen through its current version. Requires READ.
    pub async fn file_info(&self, file_id: &FileId, requester: UserId) -> Result<StoredFile> {
        self.file_for(file_id, requester, PermissionKind::Read).await
    }

    /// Files owned by `owner`, oldest first.
    pub async fn list_files(&self, owner: UserId) -> Result<Vec<StoredFile>> {
        Ok(self.store.list_files(owner).await?)
    }

    /// Delete a file with all of its versions, shares and permissions.
    ///
    /// Only the owner may delete.
    pub async fn delete(&self, file_id: &FileId, requester: UserId) -> Result<()> {
        let file = self.load_file(file_id).await?;
        self.require_owner(&file, requester).await?;

        if !self.store.delete_file(&file.id).await? {
            return Err(VaultError::NotFound);
        }

        tracing::info!(file_id = %file.id, user = %requester, "file deleted");
        self.emit(VaultEvent::FileDeleted {
            file_id: file.id,
            deleted_by: requester,
        });
        Ok(())
    }
}

//! Version history: new versions, restore, listing.
//!
//! History is append-only. Restoring version N never rewinds the current
//! pointer; it commits a snapshot of the current content followed by a copy
//! of N, both in one store transaction. Each new version is sealed under
//! fresh key material, including the copies a restore makes.

use bytes::Bytes;

use vaultshare_core::{FileId, FileVersion, PermissionKind, UserId};
use vaultshare_store::{Store, VersionDraft};

use crate::error::{Result, VaultError};
use crate::vault::Vault;

impl<S: Store> Vault<S> {
    /// Add a new version and make it current. Requires WRITE.
    ///
    /// Concurrent calls on the same file get distinct, gapless numbers.
    pub async fn create_version(
        &self,
        file_id: &FileId,
        requester: UserId,
        data: impl Into<Vec<u8>>,
        comment: &str,
    ) -> Result<FileVersion> {
        let data = data.into();
        self.config.check_size(data.len())?;
        let file = self.file_for(file_id, requester, PermissionKind::Write).await?;

        let draft = self.draft(data, requester, comment.to_string()).await?;
        let version = self
            .store
            .append_versions(&file.id, None, vec![draft])
            .await?
            .pop()
            .ok_or_else(|| VaultError::internal("append returned no versions"))?;

        tracing::info!(file_id = %file.id, user = %requester, version = version.number, "version created");
        Ok(version)
    }

    /// Restore `target` by committing it as a new version. Requires WRITE.
    ///
    /// Adds exactly two versions: a snapshot of the content current before
    /// the restore, then a copy of `target`. Returns the latter, which is
    /// now current. Fails with `Conflict` if another writer got in first.
    pub async fn restore(
        &self,
        file_id: &FileId,
        requester: UserId,
        target: u32,
    ) -> Result<FileVersion> {
        let file = self.file_for(file_id, requester, PermissionKind::Write).await?;
        let restored = self
            .store
            .get_version(&file.id, target)
            .await?
            .ok_or(VaultError::NotFound)?;

        let current = self
            .open_content(&file.id, file.current_version, &file.content)
            .await?;
        let old = self
            .open_content(&file.id, restored.number, &restored.content)
            .await?;

        let snapshot = self
            .draft(
                current.to_vec(),
                requester,
                format!("auto-snapshot before restore to version {}", target),
            )
            .await?;
        let copy = self
            .draft(
                old.to_vec(),
                requester,
                format!("restored from version {}", target),
            )
            .await?;

        let version = self
            .store
            .append_versions(&file.id, Some(file.current_version), vec![snapshot, copy])
            .await?
            .pop()
            .ok_or_else(|| VaultError::internal("append returned no versions"))?;

        tracing::info!(
            file_id = %file.id,
            user = %requester,
            version = version.number,
            restored_from = target,
            "version restored"
        );
        Ok(version)
    }

    /// A file's versions, oldest first. Requires READ.
    pub async fn list_versions(
        &self,
        file_id: &FileId,
        requester: UserId,
    ) -> Result<Vec<FileVersion>> {
        let file = self.file_for(file_id, requester, PermissionKind::Read).await?;
        Ok(self.store.list_versions(&file.id).await?)
    }

    /// Download one historical version. Requires READ.
    pub async fn download_version(
        &self,
        file_id: &FileId,
        requester: UserId,
        number: u32,
    ) -> Result<Bytes> {
        let file = self.file_for(file_id, requester, PermissionKind::Read).await?;
        let version = self
            .store
            .get_version(&file.id, number)
            .await?
            .ok_or(VaultError::NotFound)?;

        self.open_content(&file.id, version.number, &version.content)
            .await
    }

    async fn draft(
        &self,
        data: Vec<u8>,
        author: UserId,
        comment: String,
    ) -> Result<VersionDraft> {
        let size = data.len() as u64;
        let (content, blob) = self.seal_content(data).await?;
        Ok(VersionDraft {
            content,
            blob,
            size,
            created_by: author,
            created_at: self.now(),
            comment,
        })
    }
}

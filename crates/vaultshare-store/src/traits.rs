//! Store trait: the abstract interface for vault persistence.
//!
//! This trait keeps the vault storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use vaultshare_core::{
    BlobId, ContentRef, FileId, FileVersion, PermissionEntry, PermissionId, SealedBlob,
    ShareGrant, ShareId, StoredFile, UserId,
};

use crate::error::Result;

/// A version waiting for its number.
///
/// The store assigns numbers when the drafts are appended, so concurrent
/// writers never pick the same one.
#[derive(Debug, Clone)]
pub struct VersionDraft {
    /// Where the sealed content goes and how its key is derived.
    pub content: ContentRef,
    /// The sealed content itself.
    pub blob: SealedBlob,
    /// Plaintext size.
    pub size: u64,
    pub created_by: UserId,
    /// Creation time (Unix ms).
    pub created_at: i64,
    pub comment: String,
}

/// Rows removed by [`Store::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub permissions: u64,
    pub shares: u64,
}

/// The Store trait: async interface for vault persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` keeps the runtime free.
///
/// # Design Notes
///
/// - **One transaction per call**: every method that touches more than one
///   row commits all of it or none of it.
/// - **Derived current view**: a [`StoredFile`]'s size and content are read
///   from its current version; the file row only holds the version number.
/// - **Blob ids are private**: nothing maps a [`FileId`] to a [`BlobId`]
///   except the version rows.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // File Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new file together with its first version and blob.
    async fn insert_file(
        &self,
        file: &StoredFile,
        first: &FileVersion,
        blob: &SealedBlob,
    ) -> Result<()>;

    /// Get a file as seen through its current version.
    async fn get_file(&self, id: &FileId) -> Result<Option<StoredFile>>;

    /// List an owner's files, oldest first.
    async fn list_files(&self, owner: UserId) -> Result<Vec<StoredFile>>;

    /// Delete a file and everything hanging off it: versions, blobs, shares
    /// and permission entries.
    ///
    /// Returns `false` if the file did not exist.
    async fn delete_file(&self, id: &FileId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Version Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append versions to a file and advance its current pointer to the last.
    ///
    /// Numbers are allocated as `current + 1 ..= current + drafts.len()`
    /// inside one transaction. With `expected_current`, the append fails
    /// with `Conflict` if another writer moved the pointer first.
    ///
    /// Fails with `NotFound` if the file does not exist.
    async fn append_versions(
        &self,
        file_id: &FileId,
        expected_current: Option<u32>,
        drafts: Vec<VersionDraft>,
    ) -> Result<Vec<FileVersion>>;

    /// Get one version of a file.
    async fn get_version(&self, file_id: &FileId, number: u32) -> Result<Option<FileVersion>>;

    /// List a file's versions in ascending order.
    async fn list_versions(&self, file_id: &FileId) -> Result<Vec<FileVersion>>;

    /// Fetch a sealed blob.
    async fn get_blob(&self, id: &BlobId) -> Result<Option<SealedBlob>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or update the entry for `(file, user, kind)`.
    ///
    /// On conflict the existing row keeps its id and takes the new grantor,
    /// grant time and expiry. Returns the row as stored, or `NotFound` when
    /// the file no longer exists.
    async fn upsert_permission(&self, entry: &PermissionEntry) -> Result<PermissionEntry>;

    /// Get a permission entry by id.
    async fn get_permission(&self, id: &PermissionId) -> Result<Option<PermissionEntry>>;

    /// Delete a permission entry. Returns `false` if it did not exist.
    async fn delete_permission(&self, id: &PermissionId) -> Result<bool>;

    /// List a file's permission entries, expired ones included.
    async fn list_permissions(&self, file_id: &FileId) -> Result<Vec<PermissionEntry>>;

    /// List the entries held by one user on one file.
    async fn permissions_for(
        &self,
        file_id: &FileId,
        user: UserId,
    ) -> Result<Vec<PermissionEntry>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Share Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new link share. Fails with `NotFound` when the file no
    /// longer exists.
    async fn insert_link_share(&self, share: &ShareGrant) -> Result<()>;

    /// Insert or update the user share for `(file, recipient)` and upsert
    /// its permission entries, in one transaction.
    ///
    /// An existing share keeps its id and creation time. Returns the share
    /// and entries as stored. Fails with `NotFound` when the file no longer
    /// exists, and with `InvalidData` when an entry names another file.
    async fn upsert_user_share(
        &self,
        share: &ShareGrant,
        permissions: &[PermissionEntry],
    ) -> Result<(ShareGrant, Vec<PermissionEntry>)>;

    /// Get a share by id.
    async fn get_share(&self, id: &ShareId) -> Result<Option<ShareGrant>>;

    /// List a file's shares, expired ones included.
    async fn list_shares(&self, file_id: &FileId) -> Result<Vec<ShareGrant>>;

    /// Delete a share. For a user share, also delete every permission entry
    /// for the same `(file, recipient)` pair.
    ///
    /// Returns `false` if the share did not exist.
    async fn delete_share(&self, id: &ShareId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete permission entries and shares whose expiry is before `now`.
    async fn purge_expired(&self, now: i64) -> Result<PurgeCounts>;
}

//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Each method holds the
//! write lock for its whole body, which gives it the same all-or-nothing
//! behaviour as a SQLite transaction.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use vaultshare_core::{
    BlobId, FileId, FileVersion, PermissionEntry, PermissionId, PermissionKind, SealedBlob,
    ShareGrant, ShareId, ShareKind, StoredFile, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{PurgeCounts, Store, VersionDraft};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// File rows, with insertion order for stable listing.
    files: HashMap<FileId, FileRow>,

    /// Versions indexed by (file, number).
    versions: BTreeMap<(FileId, u32), FileVersion>,

    /// Sealed content.
    blobs: HashMap<BlobId, SealedBlob>,

    /// Shares by id.
    shares: BTreeMap<ShareId, ShareGrant>,

    /// Permission entries by id.
    permissions: HashMap<PermissionId, PermissionEntry>,

    /// Unique index: (file, user, kind) -> entry id.
    permission_index: HashMap<(FileId, UserId, PermissionKind), PermissionId>,

    next_seq: u64,
}

struct FileRow {
    seq: u64,
    name: String,
    owner: UserId,
    content_type: String,
    created_at: i64,
    current_version: u32,
}

impl MemoryStoreInner {
    fn view(&self, id: &FileId) -> Option<StoredFile> {
        let row = self.files.get(id)?;
        let current = self.versions.get(&(*id, row.current_version))?;
        Some(StoredFile {
            id: *id,
            name: row.name.clone(),
            owner: row.owner,
            content_type: row.content_type.clone(),
            size: current.size,
            created_at: row.created_at,
            current_version: row.current_version,
            content: current.content.clone(),
        })
    }

    fn require_file(&self, id: &FileId) -> Result<()> {
        if self.files.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("file {}", id)))
        }
    }

    fn upsert_permission(&mut self, entry: &PermissionEntry) -> PermissionEntry {
        let key = (entry.file_id, entry.user_id, entry.kind);

        if let Some(id) = self.permission_index.get(&key) {
            if let Some(existing) = self.permissions.get_mut(id) {
                existing.granted_by = entry.granted_by;
                existing.granted_at = entry.granted_at;
                existing.expires_at = entry.expires_at;
                return existing.clone();
            }
        }

        self.permission_index.insert(key, entry.id);
        self.permissions.insert(entry.id, entry.clone());
        entry.clone()
    }

    fn remove_permission(&mut self, id: &PermissionId) -> bool {
        match self.permissions.remove(id) {
            Some(entry) => {
                self.permission_index
                    .remove(&(entry.file_id, entry.user_id, entry.kind));
                true
            }
            None => false,
        }
    }

    fn remove_permissions_where(&mut self, pred: impl Fn(&PermissionEntry) -> bool) -> u64 {
        let doomed: Vec<PermissionId> = self
            .permissions
            .values()
            .filter(|entry| pred(entry))
            .map(|entry| entry.id)
            .collect();
        for id in &doomed {
            self.remove_permission(id);
        }
        doomed.len() as u64
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_file(
        &self,
        file: &StoredFile,
        first: &FileVersion,
        blob: &SealedBlob,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();

        if inner.files.contains_key(&file.id) {
            return Err(StoreError::Conflict(format!("file {} already exists", file.id)));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.files.insert(
            file.id,
            FileRow {
                seq,
                name: file.name.clone(),
                owner: file.owner,
                content_type: file.content_type.clone(),
                created_at: file.created_at,
                current_version: first.number,
            },
        );
        inner.versions.insert((file.id, first.number), first.clone());
        inner.blobs.insert(first.content.blob_id, blob.clone());

        Ok(())
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<StoredFile>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.view(id))
    }

    async fn list_files(&self, owner: UserId) -> Result<Vec<StoredFile>> {
        let inner = self.inner.read().unwrap();

        let mut rows: Vec<(&FileId, &FileRow)> = inner
            .files
            .iter()
            .filter(|(_, row)| row.owner == owner)
            .collect();
        rows.sort_by_key(|(_, row)| (row.created_at, row.seq));

        Ok(rows
            .into_iter()
            .filter_map(|(id, _)| inner.view(id))
            .collect())
    }

    async fn delete_file(&self, id: &FileId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();

        if inner.files.remove(id).is_none() {
            return Ok(false);
        }

        let numbers: Vec<u32> = inner
            .versions
            .range((*id, 0)..=(*id, u32::MAX))
            .map(|((_, number), _)| *number)
            .collect();
        for number in numbers {
            if let Some(version) = inner.versions.remove(&(*id, number)) {
                inner.blobs.remove(&version.content.blob_id);
            }
        }

        inner.shares.retain(|_, share| share.file_id != *id);
        inner.remove_permissions_where(|entry| entry.file_id == *id);

        Ok(true)
    }

    async fn append_versions(
        &self,
        file_id: &FileId,
        expected_current: Option<u32>,
        drafts: Vec<VersionDraft>,
    ) -> Result<Vec<FileVersion>> {
        let mut inner = self.inner.write().unwrap();

        let current = inner
            .files
            .get(file_id)
            .map(|row| row.current_version)
            .ok_or_else(|| StoreError::NotFound(format!("file {}", file_id)))?;

        if let Some(expected) = expected_current {
            if expected != current {
                return Err(StoreError::Conflict(format!(
                    "file {} moved from version {} to {}",
                    file_id, expected, current
                )));
            }
        }

        let mut created = Vec::with_capacity(drafts.len());
        for (number, draft) in (current + 1..).zip(drafts) {
            let version = FileVersion {
                file_id: *file_id,
                number,
                content: draft.content,
                size: draft.size,
                created_by: draft.created_by,
                created_at: draft.created_at,
                comment: draft.comment,
            };
            inner.blobs.insert(version.content.blob_id, draft.blob);
            inner.versions.insert((*file_id, number), version.clone());
            created.push(version);
        }

        if let (Some(last), Some(row)) = (created.last(), inner.files.get_mut(file_id)) {
            row.current_version = last.number;
        }

        Ok(created)
    }

    async fn get_version(&self, file_id: &FileId, number: u32) -> Result<Option<FileVersion>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.versions.get(&(*file_id, number)).cloned())
    }

    async fn list_versions(&self, file_id: &FileId) -> Result<Vec<FileVersion>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .versions
            .range((*file_id, 0)..=(*file_id, u32::MAX))
            .map(|(_, version)| version.clone())
            .collect())
    }

    async fn get_blob(&self, id: &BlobId) -> Result<Option<SealedBlob>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.blobs.get(id).cloned())
    }

    async fn upsert_permission(&self, entry: &PermissionEntry) -> Result<PermissionEntry> {
        let mut inner = self.inner.write().unwrap();
        inner.require_file(&entry.file_id)?;
        Ok(inner.upsert_permission(entry))
    }

    async fn get_permission(&self, id: &PermissionId) -> Result<Option<PermissionEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.permissions.get(id).cloned())
    }

    async fn delete_permission(&self, id: &PermissionId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        Ok(inner.remove_permission(id))
    }

    async fn list_permissions(&self, file_id: &FileId) -> Result<Vec<PermissionEntry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<PermissionEntry> = inner
            .permissions
            .values()
            .filter(|entry| entry.file_id == *file_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.granted_at, entry.user_id, entry.kind));
        Ok(entries)
    }

    async fn permissions_for(
        &self,
        file_id: &FileId,
        user: UserId,
    ) -> Result<Vec<PermissionEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(PermissionKind::ALL
            .into_iter()
            .filter_map(|kind| inner.permission_index.get(&(*file_id, user, kind)))
            .filter_map(|id| inner.permissions.get(id).cloned())
            .collect())
    }

    async fn insert_link_share(&self, share: &ShareGrant) -> Result<()> {
        if !share.is_link() {
            return Err(StoreError::InvalidData(format!(
                "share {} is not a link share",
                share.id
            )));
        }

        let mut inner = self.inner.write().unwrap();
        inner.require_file(&share.file_id)?;
        if inner.shares.contains_key(&share.id) {
            return Err(StoreError::Conflict(format!("share {} already exists", share.id)));
        }
        inner.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn upsert_user_share(
        &self,
        share: &ShareGrant,
        permissions: &[PermissionEntry],
    ) -> Result<(ShareGrant, Vec<PermissionEntry>)> {
        let recipient = share.recipient().ok_or_else(|| {
            StoreError::InvalidData(format!("share {} is not a user share", share.id))
        })?;

        let mut inner = self.inner.write().unwrap();
        inner.require_file(&share.file_id)?;
        if let Some(entry) = permissions.iter().find(|e| e.file_id != share.file_id) {
            return Err(StoreError::InvalidData(format!(
                "permission {} belongs to another file",
                entry.id
            )));
        }

        let existing = inner
            .shares
            .values_mut()
            .find(|s| s.file_id == share.file_id && s.recipient() == Some(recipient));

        let stored = match existing {
            Some(existing) => {
                existing.expires_at = share.expires_at;
                existing.clone()
            }
            None => {
                if inner.shares.contains_key(&share.id) {
                    return Err(StoreError::Conflict(format!(
                        "share {} already exists",
                        share.id
                    )));
                }
                inner.shares.insert(share.id, share.clone());
                share.clone()
            }
        };

        let entries = permissions
            .iter()
            .map(|entry| inner.upsert_permission(entry))
            .collect();

        Ok((stored, entries))
    }

    async fn get_share(&self, id: &ShareId) -> Result<Option<ShareGrant>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.shares.get(id).cloned())
    }

    async fn list_shares(&self, file_id: &FileId) -> Result<Vec<ShareGrant>> {
        let inner = self.inner.read().unwrap();
        let mut shares: Vec<ShareGrant> = inner
            .shares
            .values()
            .filter(|share| share.file_id == *file_id)
            .cloned()
            .collect();
        shares.sort_by_key(|share| share.created_at);
        Ok(shares)
    }

    async fn delete_share(&self, id: &ShareId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();

        let Some(share) = inner.shares.remove(id) else {
            return Ok(false);
        };

        if let ShareKind::User { recipient } = share.kind {
            inner.remove_permissions_where(|entry| {
                entry.file_id == share.file_id && entry.user_id == recipient
            });
        }

        Ok(true)
    }

    async fn purge_expired(&self, now: i64) -> Result<PurgeCounts> {
        let mut inner = self.inner.write().unwrap();

        let permissions =
            inner.remove_permissions_where(|entry| matches!(entry.expires_at, Some(e) if e < now));

        let before = inner.shares.len();
        inner
            .shares
            .retain(|_, share| !matches!(share.expires_at, Some(e) if e < now));
        let shares = (before - inner.shares.len()) as u64;

        Ok(PurgeCounts {
            permissions,
            shares,
        })
    }
}

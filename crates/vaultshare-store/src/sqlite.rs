//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via `tokio::task::spawn_blocking`. A single
//! connection behind a mutex serializes writers, and every multi-row
//! mutation runs in one transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use vaultshare_core::{
    BlobId, Clock, ContentRef, CoreError, EncryptionFormat, FileId, FileVersion, KeyMaterial,
    PermissionEntry, PermissionId, PermissionKind, SealedBlob, ShareGrant, ShareId, ShareKind,
    StoredFile, SystemClock, UserId, NONCE_LEN,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{PurgeCounts, Store, VersionDraft};

const SHARE_KIND_LINK: i64 = 0;
const SHARE_KIND_USER: i64 = 1;

const FILE_COLUMNS: &str = "SELECT f.file_id, f.name, f.owner, f.content_type, f.created_at,
        f.current_version, v.size, v.blob_id, v.key_material
     FROM files f
     JOIN versions v ON v.file_id = f.file_id AND v.number = f.current_version";

const VERSION_COLUMNS: &str = "SELECT file_id, number, blob_id, key_material, size,
        created_by, created_at, comment
     FROM versions";

const SHARE_COLUMNS: &str = "SELECT share_id, file_id, kind, recipient, created_by,
        created_at, expires_at
     FROM shares";

const PERMISSION_COLUMNS: &str = "SELECT permission_id, file_id, user_id, kind, granted_by,
        granted_at, expires_at
     FROM permissions";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn, SystemClock.now_millis())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn, SystemClock.now_millis())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on a blocking thread.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn conversion_error(idx: usize, ty: Type, err: CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn id_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8], Error = CoreError>,
{
    let bytes: Vec<u8> = row.get(idx)?;
    T::try_from(bytes.as_slice()).map_err(|e| conversion_error(idx, Type::Blob, e))
}

fn user_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<UserId> {
    let raw: i64 = row.get(idx)?;
    Ok(UserId(raw as u64))
}

fn key_material_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<KeyMaterial> {
    let bytes: Vec<u8> = row.get(idx)?;
    KeyMaterial::from_bytes(&bytes).map_err(|e| conversion_error(idx, Type::Blob, e))
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<StoredFile> {
    Ok(StoredFile {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        owner: user_column(row, 2)?,
        content_type: row.get(3)?,
        created_at: row.get(4)?,
        current_version: row.get(5)?,
        size: row.get::<_, i64>(6)? as u64,
        content: ContentRef {
            blob_id: id_column(row, 7)?,
            key: key_material_column(row, 8)?,
        },
    })
}

fn row_to_version(row: &Row<'_>) -> rusqlite::Result<FileVersion> {
    Ok(FileVersion {
        file_id: id_column(row, 0)?,
        number: row.get(1)?,
        content: ContentRef {
            blob_id: id_column(row, 2)?,
            key: key_material_column(row, 3)?,
        },
        size: row.get::<_, i64>(4)? as u64,
        created_by: user_column(row, 5)?,
        created_at: row.get(6)?,
        comment: row.get(7)?,
    })
}

fn row_to_share(row: &Row<'_>) -> rusqlite::Result<ShareGrant> {
    let kind = match row.get::<_, i64>(2)? {
        SHARE_KIND_LINK => ShareKind::Link,
        SHARE_KIND_USER => ShareKind::User {
            recipient: user_column(row, 3)?,
        },
        _ => return Err(rusqlite::Error::InvalidColumnType(2, "kind".into(), Type::Integer)),
    };

    Ok(ShareGrant {
        id: id_column(row, 0)?,
        file_id: id_column(row, 1)?,
        created_by: user_column(row, 4)?,
        created_at: row.get(5)?,
        expires_at: row.get(6)?,
        kind,
    })
}

fn row_to_permission(row: &Row<'_>) -> rusqlite::Result<PermissionEntry> {
    let kind: String = row.get(3)?;
    let kind: PermissionKind = kind
        .parse()
        .map_err(|e| conversion_error(3, Type::Text, e))?;

    Ok(PermissionEntry {
        id: id_column(row, 0)?,
        file_id: id_column(row, 1)?,
        user_id: user_column(row, 2)?,
        kind,
        granted_by: user_column(row, 4)?,
        granted_at: row.get(5)?,
        expires_at: row.get(6)?,
    })
}

fn row_to_blob(row: &Row<'_>) -> rusqlite::Result<SealedBlob> {
    let format = EncryptionFormat::from_u8(row.get(0)?)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(0, "format".into(), Type::Integer))?;
    let nonce: Vec<u8> = row.get(1)?;
    let nonce: [u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(1, "nonce".into(), Type::Blob))?;

    Ok(SealedBlob {
        format,
        nonce,
        ciphertext: row.get(2)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Row writing
// ─────────────────────────────────────────────────────────────────────────────

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_version(conn: &Connection, version: &FileVersion) -> Result<()> {
    let key_material = version
        .content
        .key
        .to_bytes()
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO versions (
            file_id, number, blob_id, key_material, size, created_by, created_at, comment
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            version.file_id.as_bytes().as_slice(),
            version.number,
            version.content.blob_id.as_bytes().as_slice(),
            key_material,
            version.size as i64,
            version.created_by.0 as i64,
            version.created_at,
            version.comment,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Conflict(format!(
                "version {} of file {} already exists",
                version.number, version.file_id
            ))
        } else {
            StoreError::Database(e)
        }
    })?;

    Ok(())
}

fn insert_blob(conn: &Connection, blob_id: &BlobId, blob: &SealedBlob) -> Result<()> {
    conn.execute(
        "INSERT INTO blobs (blob_id, format, nonce, ciphertext) VALUES (?1, ?2, ?3, ?4)",
        params![
            blob_id.as_bytes().as_slice(),
            blob.format.to_u8(),
            blob.nonce.as_slice(),
            blob.ciphertext.as_slice(),
        ],
    )?;
    Ok(())
}

fn require_file(conn: &Connection, id: &FileId) -> Result<()> {
    conn.query_row(
        "SELECT 1 FROM files WHERE file_id = ?1",
        params![id.as_bytes().as_slice()],
        |_| Ok(()),
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("file {}", id)))
}

fn upsert_permission_row(conn: &Connection, entry: &PermissionEntry) -> Result<PermissionEntry> {
    conn.execute(
        "INSERT INTO permissions (
            permission_id, file_id, user_id, kind, granted_by, granted_at, expires_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(file_id, user_id, kind) DO UPDATE SET
            granted_by = excluded.granted_by,
            granted_at = excluded.granted_at,
            expires_at = excluded.expires_at",
        params![
            entry.id.as_bytes().as_slice(),
            entry.file_id.as_bytes().as_slice(),
            entry.user_id.0 as i64,
            entry.kind.as_str(),
            entry.granted_by.0 as i64,
            entry.granted_at,
            entry.expires_at,
        ],
    )?;

    let stored = conn.query_row(
        &format!("{PERMISSION_COLUMNS} WHERE file_id = ?1 AND user_id = ?2 AND kind = ?3"),
        params![
            entry.file_id.as_bytes().as_slice(),
            entry.user_id.0 as i64,
            entry.kind.as_str(),
        ],
        row_to_permission,
    )?;
    Ok(stored)
}

fn insert_share_row(conn: &Connection, share: &ShareGrant) -> Result<()> {
    let (kind, recipient) = match share.kind {
        ShareKind::Link => (SHARE_KIND_LINK, None),
        ShareKind::User { recipient } => (SHARE_KIND_USER, Some(recipient.0 as i64)),
    };

    conn.execute(
        "INSERT INTO shares (
            share_id, file_id, kind, recipient, created_by, created_at, expires_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            share.id.as_bytes().as_slice(),
            share.file_id.as_bytes().as_slice(),
            kind,
            recipient,
            share.created_by.0 as i64,
            share.created_at,
            share.expires_at,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::Conflict(format!("share {} already exists", share.id))
        } else {
            StoreError::Database(e)
        }
    })?;
    Ok(())
}

fn get_share_row(conn: &Connection, id: &ShareId) -> Result<Option<ShareGrant>> {
    conn.query_row(
        &format!("{SHARE_COLUMNS} WHERE share_id = ?1"),
        params![id.as_bytes().as_slice()],
        row_to_share,
    )
    .optional()
    .map_err(StoreError::from)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_file(
        &self,
        file: &StoredFile,
        first: &FileVersion,
        blob: &SealedBlob,
    ) -> Result<()> {
        let file = file.clone();
        let first = first.clone();
        let blob = blob.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO files (
                    file_id, name, owner, content_type, created_at, current_version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    file.id.as_bytes().as_slice(),
                    file.name,
                    file.owner.0 as i64,
                    file.content_type,
                    file.created_at,
                    first.number,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("file {} already exists", file.id))
                } else {
                    StoreError::Database(e)
                }
            })?;
            insert_version(&tx, &first)?;
            insert_blob(&tx, &first.content.blob_id, &blob)?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<StoredFile>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("{FILE_COLUMNS} WHERE f.file_id = ?1"),
                params![id.as_bytes().as_slice()],
                row_to_file,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_files(&self, owner: UserId) -> Result<Vec<StoredFile>> {
        self.run(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{FILE_COLUMNS} WHERE f.owner = ?1 ORDER BY f.created_at, f.rowid"))?;
            let files = stmt
                .query_map(params![owner.0 as i64], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
        .await
    }

    async fn delete_file(&self, id: &FileId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let key = id.as_bytes().as_slice();

            tx.execute(
                "DELETE FROM blobs WHERE blob_id IN (SELECT blob_id FROM versions WHERE file_id = ?1)",
                params![key],
            )?;
            tx.execute("DELETE FROM versions WHERE file_id = ?1", params![key])?;
            tx.execute("DELETE FROM shares WHERE file_id = ?1", params![key])?;
            tx.execute("DELETE FROM permissions WHERE file_id = ?1", params![key])?;
            let deleted = tx.execute("DELETE FROM files WHERE file_id = ?1", params![key])?;

            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn append_versions(
        &self,
        file_id: &FileId,
        expected_current: Option<u32>,
        drafts: Vec<VersionDraft>,
    ) -> Result<Vec<FileVersion>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current: u32 = tx
                .query_row(
                    "SELECT current_version FROM files WHERE file_id = ?1",
                    params![file_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?
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
                    file_id,
                    number,
                    content: draft.content,
                    size: draft.size,
                    created_by: draft.created_by,
                    created_at: draft.created_at,
                    comment: draft.comment,
                };
                insert_version(&tx, &version)?;
                insert_blob(&tx, &version.content.blob_id, &draft.blob)?;
                created.push(version);
            }

            if let Some(last) = created.last() {
                tx.execute(
                    "UPDATE files SET current_version = ?1 WHERE file_id = ?2",
                    params![last.number, file_id.as_bytes().as_slice()],
                )?;
            }

            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn get_version(&self, file_id: &FileId, number: u32) -> Result<Option<FileVersion>> {
        let file_id = *file_id;

        self.run(move |conn| {
            conn.query_row(
                &format!("{VERSION_COLUMNS} WHERE file_id = ?1 AND number = ?2"),
                params![file_id.as_bytes().as_slice(), number],
                row_to_version,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_versions(&self, file_id: &FileId) -> Result<Vec<FileVersion>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let mut stmt =
                conn.prepare(&format!("{VERSION_COLUMNS} WHERE file_id = ?1 ORDER BY number"))?;
            let versions = stmt
                .query_map(params![file_id.as_bytes().as_slice()], row_to_version)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(versions)
        })
        .await
    }

    async fn get_blob(&self, id: &BlobId) -> Result<Option<SealedBlob>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                "SELECT format, nonce, ciphertext FROM blobs WHERE blob_id = ?1",
                params![id.as_bytes().as_slice()],
                row_to_blob,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn upsert_permission(&self, entry: &PermissionEntry) -> Result<PermissionEntry> {
        let entry = entry.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_file(&tx, &entry.file_id)?;
            let stored = upsert_permission_row(&tx, &entry)?;
            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    async fn get_permission(&self, id: &PermissionId) -> Result<Option<PermissionEntry>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("{PERMISSION_COLUMNS} WHERE permission_id = ?1"),
                params![id.as_bytes().as_slice()],
                row_to_permission,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_permission(&self, id: &PermissionId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM permissions WHERE permission_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_permissions(&self, file_id: &FileId) -> Result<Vec<PermissionEntry>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{PERMISSION_COLUMNS} WHERE file_id = ?1 ORDER BY granted_at, user_id, kind"
            ))?;
            let entries = stmt
                .query_map(params![file_id.as_bytes().as_slice()], row_to_permission)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn permissions_for(
        &self,
        file_id: &FileId,
        user: UserId,
    ) -> Result<Vec<PermissionEntry>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{PERMISSION_COLUMNS} WHERE file_id = ?1 AND user_id = ?2 ORDER BY kind"
            ))?;
            let entries = stmt
                .query_map(
                    params![file_id.as_bytes().as_slice(), user.0 as i64],
                    row_to_permission,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn insert_link_share(&self, share: &ShareGrant) -> Result<()> {
        if !share.is_link() {
            return Err(StoreError::InvalidData(format!(
                "share {} is not a link share",
                share.id
            )));
        }
        let share = share.clone();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_file(&tx, &share.file_id)?;
            insert_share_row(&tx, &share)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert_user_share(
        &self,
        share: &ShareGrant,
        permissions: &[PermissionEntry],
    ) -> Result<(ShareGrant, Vec<PermissionEntry>)> {
        let recipient = share.recipient().ok_or_else(|| {
            StoreError::InvalidData(format!("share {} is not a user share", share.id))
        })?;

        if let Some(entry) = permissions.iter().find(|e| e.file_id != share.file_id) {
            return Err(StoreError::InvalidData(format!(
                "permission {} belongs to another file",
                entry.id
            )));
        }
        let share = share.clone();
        let permissions = permissions.to_vec();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            require_file(&tx, &share.file_id)?;

            let existing: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT share_id FROM shares
                     WHERE file_id = ?1 AND kind = ?2 AND recipient = ?3",
                    params![
                        share.file_id.as_bytes().as_slice(),
                        SHARE_KIND_USER,
                        recipient.0 as i64,
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            let share_id = match existing {
                Some(bytes) => {
                    let id = ShareId::try_from(bytes.as_slice())
                        .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                    tx.execute(
                        "UPDATE shares SET expires_at = ?1 WHERE share_id = ?2",
                        params![share.expires_at, id.as_bytes().as_slice()],
                    )?;
                    id
                }
                None => {
                    insert_share_row(&tx, &share)?;
                    share.id
                }
            };

            let entries = permissions
                .iter()
                .map(|entry| upsert_permission_row(&tx, entry))
                .collect::<Result<Vec<_>>>()?;

            let stored = get_share_row(&tx, &share_id)?
                .ok_or_else(|| StoreError::NotFound(format!("share {}", share_id)))?;

            tx.commit()?;
            Ok((stored, entries))
        })
        .await
    }

    async fn get_share(&self, id: &ShareId) -> Result<Option<ShareGrant>> {
        let id = *id;
        self.run(move |conn| get_share_row(conn, &id)).await
    }

    async fn list_shares(&self, file_id: &FileId) -> Result<Vec<ShareGrant>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SHARE_COLUMNS} WHERE file_id = ?1 ORDER BY created_at, rowid"
            ))?;
            let shares = stmt
                .query_map(params![file_id.as_bytes().as_slice()], row_to_share)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(shares)
        })
        .await
    }

    async fn delete_share(&self, id: &ShareId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let Some(share) = get_share_row(&tx, &id)? else {
                return Ok(false);
            };

            tx.execute(
                "DELETE FROM shares WHERE share_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            if let ShareKind::User { recipient } = share.kind {
                tx.execute(
                    "DELETE FROM permissions WHERE file_id = ?1 AND user_id = ?2",
                    params![share.file_id.as_bytes().as_slice(), recipient.0 as i64],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<PurgeCounts> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let permissions = tx.execute(
                "DELETE FROM permissions WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![now],
            )?;
            let shares = tx.execute(
                "DELETE FROM shares WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![now],
            )?;
            tx.commit()?;

            Ok(PurgeCounts {
                permissions: permissions as u64,
                shares: shares as u64,
            })
        })
        .await
    }
}

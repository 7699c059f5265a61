//! Persisted records: files, versions, shares and permission entries.
//!
//! Records reference each other by id only. A file points at its current
//! version by number; versions carry the id of their file. Neither owns the
//! other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::KeyMaterial;
use crate::error::CoreError;
use crate::types::{BlobId, FileId, PermissionId, ShareId, UserId};

/// The kinds of access a permission entry can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionKind {
    /// Download current or historical content.
    Read,
    /// Create new versions and restore old ones.
    Write,
    /// Grant permissions and create shares.
    Share,
}

impl PermissionKind {
    /// All kinds, in a stable order.
    pub const ALL: [PermissionKind; 3] = [Self::Read, Self::Write, Self::Share];

    /// Storage and wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Share => "SHARE",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            "SHARE" => Ok(Self::Share),
            other => Err(CoreError::UnknownPermissionKind(other.to_string())),
        }
    }
}

/// Where a piece of content lives and how its key is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    /// Opaque blob key.
    pub blob_id: BlobId,
    /// Key material owned by the version that created this content.
    pub key: KeyMaterial,
}

/// A stored file as seen through its current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    /// Display name as uploaded.
    pub name: String,
    /// The single owner.
    pub owner: UserId,
    /// Content type of the plaintext.
    pub content_type: String,
    /// Plaintext size of the current version.
    pub size: u64,
    /// Upload time (Unix ms).
    pub created_at: i64,
    /// Number of the version reads resolve to.
    pub current_version: u32,
    /// Content of the current version.
    pub content: ContentRef,
}

impl StoredFile {
    /// Whether `user` owns this file.
    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner == user
    }
}

/// One immutable snapshot in a file's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub file_id: FileId,
    /// 1-based, gapless, unique per file.
    pub number: u32,
    pub content: ContentRef,
    /// Plaintext size.
    pub size: u64,
    pub created_by: UserId,
    /// Creation time (Unix ms).
    pub created_at: i64,
    pub comment: String,
}

/// A share's kind-specific fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareKind {
    /// Bearer link. The token is signed, never stored.
    Link,
    /// Direct share with a named recipient.
    User { recipient: UserId },
}

/// A link share or a user share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: ShareId,
    pub file_id: FileId,
    pub created_by: UserId,
    /// Creation time (Unix ms).
    pub created_at: i64,
    /// Expiry (Unix ms); `None` never expires.
    pub expires_at: Option<i64>,
    pub kind: ShareKind,
}

impl ShareGrant {
    /// Whether the share has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }

    /// The named recipient, for user shares.
    pub fn recipient(&self) -> Option<UserId> {
        match self.kind {
            ShareKind::User { recipient } => Some(recipient),
            ShareKind::Link => None,
        }
    }

    /// Whether this is a link share.
    pub fn is_link(&self) -> bool {
        matches!(self.kind, ShareKind::Link)
    }
}

/// A (file, user, kind) permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub id: PermissionId,
    pub file_id: FileId,
    pub user_id: UserId,
    pub kind: PermissionKind,
    pub granted_by: UserId,
    /// Grant time (Unix ms).
    pub granted_at: i64,
    /// Expiry (Unix ms); `None` never expires.
    pub expires_at: Option<i64>,
}

impl PermissionEntry {
    /// Whether the entry is in force at `now`.
    ///
    /// Derived on every read; an expired entry stays in storage until purged.
    pub fn is_active(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => now <= expires,
            None => true,
        }
    }
}

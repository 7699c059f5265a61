//! Permission grants, link shares and user shares.
//!
//! Managing access requires SHARE on the file (owners hold it implicitly).
//! Revocation is allowed to whoever created the grant and to the owner.
//! Share tokens are never stored: a token is a signature over the share id
//! and its issue time, checked against the share row on every use.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use vaultshare_core::{
    FileId, PermissionEntry, PermissionId, PermissionKind, ShareGrant, ShareId, ShareKind,
    UserId,
};
use vaultshare_perms::Principal;
use vaultshare_store::{PurgeCounts, Store};

use crate::error::{Result, VaultError};
use crate::events::VaultEvent;
use crate::vault::Vault;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// A freshly created link share.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkShare {
    pub share_id: ShareId,
    /// Bearer token. Shown to the creator once; not recoverable later.
    pub token: String,
    /// Expiry (Unix ms).
    pub expires_at: i64,
}

impl std::fmt::Debug for LinkShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkShare")
            .field("share_id", &self.share_id)
            .field("token", &"..")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What a link-share download returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl<S: Store> Vault<S> {
    /// Grant `kind` on a file to `target`. Requires SHARE.
    ///
    /// Granting an existing (file, user, kind) again updates its grantor and
    /// expiry and keeps its id.
    pub async fn grant(
        &self,
        file_id: &FileId,
        grantor: UserId,
        target: UserId,
        kind: PermissionKind,
        expires_at: Option<i64>,
    ) -> Result<PermissionEntry> {
        let file = self.file_for(file_id, grantor, PermissionKind::Share).await?;
        if file.is_owner(target) {
            return Err(VaultError::InvalidArgument(
                "the owner already holds every permission".into(),
            ));
        }
        self.require_user(target).await?;

        let entry = PermissionEntry {
            id: PermissionId::generate(),
            file_id: file.id,
            user_id: target,
            kind,
            granted_by: grantor,
            granted_at: self.now(),
            expires_at,
        };
        let entry = self.store.upsert_permission(&entry).await?;

        tracing::info!(
            file_id = %file.id,
            user = %target,
            %kind,
            granted_by = %grantor,
            "permission granted"
        );
        self.emit_granted(&entry);
        Ok(entry)
    }

    /// Remove a permission entry. Allowed to the owner and the grantor.
    pub async fn revoke_permission(
        &self,
        permission_id: &PermissionId,
        requester: UserId,
    ) -> Result<()> {
        let entry = self
            .store
            .get_permission(permission_id)
            .await?
            .ok_or(VaultError::NotFound)?;
        let file = self.load_file(&entry.file_id).await?;

        if entry.granted_by != requester && !self.owns(&file, requester).await? {
            tracing::warn!(file_id = %file.id, user = %requester, "permission revoke denied");
            return Err(VaultError::Forbidden);
        }
        if !self.store.delete_permission(&entry.id).await? {
            return Err(VaultError::NotFound);
        }

        tracing::info!(file_id = %file.id, user = %entry.user_id, kind = %entry.kind, "permission revoked");
        self.emit(VaultEvent::PermissionRevoked {
            file_id: file.id,
            permission_id: entry.id,
            user: entry.user_id,
            revoked_by: requester,
        });
        Ok(())
    }

    /// Create a link share valid for `ttl_hours`. Requires SHARE.
    ///
    /// The returned `expires_at` never outlives the token itself, so a ttl
    /// longer than `share_link_max_age_secs` is cut to that age.
    pub async fn create_link_share(
        &self,
        file_id: &FileId,
        creator: UserId,
        ttl_hours: u32,
    ) -> Result<LinkShare> {
        if ttl_hours == 0 || ttl_hours > self.config.max_share_ttl_hours {
            return Err(VaultError::InvalidArgument(format!(
                "ttl_hours must be between 1 and {}",
                self.config.max_share_ttl_hours
            )));
        }
        let file = self.file_for(file_id, creator, PermissionKind::Share).await?;

        let now = self.now();
        let ttl = (i64::from(ttl_hours) * MILLIS_PER_HOUR)
            .min(self.config.share_link_max_age_millis());
        let expires_at = now.saturating_add(ttl);
        let share = ShareGrant {
            id: ShareId::generate(),
            file_id: file.id,
            created_by: creator,
            created_at: now,
            expires_at: Some(expires_at),
            kind: ShareKind::Link,
        };
        let token = self.tokens.issue(&share.id, now)?;
        self.store.insert_link_share(&share).await?;

        tracing::info!(file_id = %file.id, share_id = %share.id, user = %creator, ttl_hours, "link share created");
        self.emit(VaultEvent::ShareCreated {
            file_id: file.id,
            share_id: share.id,
            created_by: creator,
            recipient: None,
            expires_at: share.expires_at,
        });

        Ok(LinkShare {
            share_id: share.id,
            token,
            expires_at,
        })
    }

    /// Share a file directly with `target`. Requires SHARE.
    ///
    /// An empty `kinds` means READ only. Sharing with the same recipient
    /// again keeps the existing share and upserts the requested kinds.
    pub async fn create_user_share(
        &self,
        file_id: &FileId,
        requester: UserId,
        target: UserId,
        kinds: &[PermissionKind],
    ) -> Result<ShareGrant> {
        let file = self.file_for(file_id, requester, PermissionKind::Share).await?;
        if file.is_owner(target) {
            return Err(VaultError::InvalidArgument(
                "cannot share a file with its owner".into(),
            ));
        }
        self.require_user(target).await?;

        let mut kinds = if kinds.is_empty() {
            vec![PermissionKind::Read]
        } else {
            kinds.to_vec()
        };
        kinds.sort();
        kinds.dedup();

        let now = self.now();
        let share = ShareGrant {
            id: ShareId::generate(),
            file_id: file.id,
            created_by: requester,
            created_at: now,
            expires_at: None,
            kind: ShareKind::User { recipient: target },
        };
        let entries: Vec<PermissionEntry> = kinds
            .into_iter()
            .map(|kind| PermissionEntry {
                id: PermissionId::generate(),
                file_id: file.id,
                user_id: target,
                kind,
                granted_by: requester,
                granted_at: now,
                expires_at: None,
            })
            .collect();

        let (share, entries) = self.store.upsert_user_share(&share, &entries).await?;

        tracing::info!(
            file_id = %file.id,
            share_id = %share.id,
            user = %target,
            kinds = entries.len(),
            "user share created"
        );
        self.emit(VaultEvent::ShareCreated {
            file_id: file.id,
            share_id: share.id,
            created_by: requester,
            recipient: Some(target),
            expires_at: share.expires_at,
        });
        for entry in &entries {
            self.emit_granted(entry);
        }

        Ok(share)
    }

    /// Check a share token and return the link share it names.
    ///
    /// Every rejection (bad signature, too old, unknown share, expired
    /// share, not a link share) is the same `InvalidToken`.
    pub async fn validate_token(&self, token: &str) -> Result<ShareGrant> {
        let now = self.now();
        let share_id = match self.tokens.verify(token, now) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "share token rejected");
                return Err(VaultError::InvalidToken);
            }
        };

        match self.store.get_share(&share_id).await? {
            Some(share) if share.is_link() && !share.is_expired(now) => Ok(share),
            Some(_) => {
                tracing::warn!(share_id = %share_id, "share token names an expired or non-link share");
                Err(VaultError::InvalidToken)
            }
            None => {
                tracing::warn!(share_id = %share_id, "share token names an unknown share");
                Err(VaultError::InvalidToken)
            }
        }
    }

    /// The file a share token grants access to.
    pub async fn resolve_share_token(&self, token: &str) -> Result<FileId> {
        Ok(self.validate_token(token).await?.file_id)
    }

    /// Download the current version of a file through a link share.
    pub async fn download_shared(&self, token: &str) -> Result<SharedFile> {
        let share = self.validate_token(token).await?;
        let file = self.load_file(&share.file_id).await?;
        self.require(&file, Principal::Link(share.id), PermissionKind::Read)
            .await?;

        let data = self
            .open_content(&file.id, file.current_version, &file.content)
            .await?;

        tracing::debug!(file_id = %file.id, share_id = %share.id, "shared download");
        Ok(SharedFile {
            name: file.name,
            content_type: file.content_type,
            data,
        })
    }

    /// Delete a share. Allowed to the share's creator and the owner.
    ///
    /// Revoking a user share also removes every permission entry the
    /// recipient holds on the file.
    pub async fn revoke_share(&self, share_id: &ShareId, requester: UserId) -> Result<()> {
        let share = self
            .store
            .get_share(share_id)
            .await?
            .ok_or(VaultError::NotFound)?;
        let file = self.load_file(&share.file_id).await?;

        if share.created_by != requester && !self.owns(&file, requester).await? {
            tracing::warn!(file_id = %file.id, share_id = %share.id, user = %requester, "share revoke denied");
            return Err(VaultError::Forbidden);
        }
        if !self.store.delete_share(&share.id).await? {
            return Err(VaultError::NotFound);
        }

        tracing::info!(file_id = %file.id, share_id = %share.id, user = %requester, "share revoked");
        self.emit(VaultEvent::ShareRevoked {
            file_id: file.id,
            share_id: share.id,
            revoked_by: requester,
        });
        Ok(())
    }

    /// A file's permission entries, expired ones included. Requires SHARE.
    pub async fn list_permissions(
        &self,
        file_id: &FileId,
        requester: UserId,
    ) -> Result<Vec<PermissionEntry>> {
        let file = self.file_for(file_id, requester, PermissionKind::Share).await?;
        Ok(self.store.list_permissions(&file.id).await?)
    }

    /// A file's shares, expired ones included. Requires SHARE.
    pub async fn list_shares(
        &self,
        file_id: &FileId,
        requester: UserId,
    ) -> Result<Vec<ShareGrant>> {
        let file = self.file_for(file_id, requester, PermissionKind::Share).await?;
        Ok(self.store.list_shares(&file.id).await?)
    }

    /// Look a user up by email address.
    pub async fn user_by_email(&self, email: &str) -> Result<UserId> {
        self.directory
            .find_by_email(email)
            .await
            .map_err(VaultError::internal)?
            .ok_or(VaultError::NotFound)
    }

    /// Delete permission entries and shares that have expired.
    pub async fn purge_expired(&self) -> Result<PurgeCounts> {
        let counts = self.store.purge_expired(self.now()).await?;
        tracing::info!(
            permissions = counts.permissions,
            shares = counts.shares,
            "expired grants purged"
        );
        Ok(counts)
    }

    async fn require_user(&self, user: UserId) -> Result<()> {
        if self
            .directory
            .user_exists(user)
            .await
            .map_err(VaultError::internal)?
        {
            Ok(())
        } else {
            Err(VaultError::NotFound)
        }
    }

    fn emit_granted(&self, entry: &PermissionEntry) {
        self.emit(VaultEvent::PermissionGranted {
            file_id: entry.file_id,
            permission_id: entry.id,
            user: entry.user_id,
            kind: entry.kind,
            granted_by: entry.granted_by,
        });
    }
}

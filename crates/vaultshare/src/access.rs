//! The authorization gate.
//!
//! Every operation that touches a file resolves it here first and asks the
//! [`AccessState`] whether the requester may proceed: `can` for a permission
//! kind, `owns` for owner-only operations like delete. Checks are point in
//! time: once a request passes, an expiry that lands mid-request does not
//! interrupt it.

use vaultshare_core::{FileId, PermissionKind, StoredFile, UserId};
use vaultshare_perms::{AccessState, Principal};
use vaultshare_store::Store;

use crate::error::{Result, VaultError};
use crate::vault::Vault;

impl<S: Store> Vault<S> {
    /// Whether `requester` holds `kind` on `file_id` right now.
    ///
    /// Owners hold every kind. Fails with `NotFound` for an unknown file.
    pub async fn authorize(
        &self,
        file_id: &FileId,
        requester: UserId,
        kind: PermissionKind,
    ) -> Result<bool> {
        let file = self.load_file(file_id).await?;
        self.check(&file, Principal::User(requester), kind).await
    }

    pub(crate) async fn load_file(&self, file_id: &FileId) -> Result<StoredFile> {
        self.store
            .get_file(file_id)
            .await?
            .ok_or(VaultError::NotFound)
    }

    /// Load `file_id` and require `kind` of `requester`.
    pub(crate) async fn file_for(
        &self,
        file_id: &FileId,
        requester: UserId,
        kind: PermissionKind,
    ) -> Result<StoredFile> {
        let file = self.load_file(file_id).await?;
        self.require(&file, Principal::User(requester), kind).await?;
        Ok(file)
    }

    pub(crate) async fn access_state(
        &self,
        file: &StoredFile,
        principal: Principal,
    ) -> Result<AccessState> {
        if principal == Principal::User(file.owner) {
            return Ok(AccessState::new(file.id, file.owner));
        }

        let permissions = match principal {
            Principal::User(user) => self.store.permissions_for(&file.id, user).await?,
            Principal::Link(_) => Vec::new(),
        };
        let shares = self.store.list_shares(&file.id).await?;

        Ok(AccessState::from_rows(file.id, file.owner, permissions, shares))
    }

    pub(crate) async fn check(
        &self,
        file: &StoredFile,
        principal: Principal,
        kind: PermissionKind,
    ) -> Result<bool> {
        let state = self.access_state(file, principal).await?;
        Ok(state.can(principal, kind, self.now()))
    }

    pub(crate) async fn require(
        &self,
        file: &StoredFile,
        principal: Principal,
        kind: PermissionKind,
    ) -> Result<()> {
        if self.check(file, principal, kind).await? {
            return Ok(());
        }

        tracing::warn!(file_id = %file.id, ?principal, %kind, "access denied");
        Err(VaultError::Forbidden)
    }

    pub(crate) async fn owns(&self, file: &StoredFile, user: UserId) -> Result<bool> {
        let principal = Principal::User(user);
        Ok(self.access_state(file, principal).await?.owns(principal))
    }

    pub(crate) async fn require_owner(&self, file: &StoredFile, user: UserId) -> Result<()> {
        if self.owns(file, user).await? {
            return Ok(());
        }

        tracing::warn!(file_id = %file.id, %user, "owner-only operation denied");
        Err(VaultError::Forbidden)
    }
}

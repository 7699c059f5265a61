//! Access state for one file.
//!
//! An [`AccessState`] is assembled from a file's owner, its permission
//! entries and its shares, then queried with [`AccessState::can`] for the
//! three permission kinds, or [`AccessState::owns`] for owner-only actions
//! such as deleting the file. Every read, write, share and delete path goes
//! through one of the two.
//!
//! Expiry is evaluated at query time. Expired rows may still be applied;
//! they simply never authorize anything.

use std::collections::HashMap;

use vaultshare_core::{
    FileId, PermissionEntry, PermissionKind, ShareGrant, ShareId, ShareKind, UserId,
};

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// An authenticated user.
    User(UserId),
    /// The bearer of a verified link token for this share.
    Link(ShareId),
}

/// Aggregated permission state for a single file.
#[derive(Debug, Clone)]
pub struct AccessState {
    file_id: FileId,
    owner: UserId,

    /// Index: (user, kind) -> entry. At most one per pair.
    entries: HashMap<(UserId, PermissionKind), PermissionEntry>,

    /// All shares by id.
    shares: HashMap<ShareId, ShareGrant>,

    /// Index: recipient -> user share id.
    by_recipient: HashMap<UserId, ShareId>,
}

impl AccessState {
    /// Start with only the owner.
    pub fn new(file_id: FileId, owner: UserId) -> Self {
        Self {
            file_id,
            owner,
            entries: HashMap::new(),
            shares: HashMap::new(),
            by_recipient: HashMap::new(),
        }
    }

    /// Build from stored rows, skipping rows for other files.
    pub fn from_rows(
        file_id: FileId,
        owner: UserId,
        permissions: impl IntoIterator<Item = PermissionEntry>,
        shares: impl IntoIterator<Item = ShareGrant>,
    ) -> Self {
        let mut state = Self::new(file_id, owner);
        for entry in permissions {
            state.apply_permission(entry);
        }
        for share in shares {
            state.apply_share(share);
        }
        state
    }

    /// Add or replace a permission entry.
    pub fn apply_permission(&mut self, entry: PermissionEntry) {
        if entry.file_id != self.file_id {
            return;
        }
        self.entries.insert((entry.user_id, entry.kind), entry);
    }

    /// Add or replace a share.
    pub fn apply_share(&mut self, share: ShareGrant) {
        if share.file_id != self.file_id {
            return;
        }
        if let ShareKind::User { recipient } = share.kind {
            self.by_recipient.insert(recipient, share.id);
        }
        self.shares.insert(share.id, share);
    }

    /// Whether `principal` holds `kind` on this file at `now`.
    ///
    /// - the owner holds every kind;
    /// - a user holds a kind through an active entry of that kind, and holds
    ///   READ through an active user share naming them;
    /// - a link bearer holds READ only, through an active link share.
    pub fn can(&self, principal: Principal, kind: PermissionKind, now: i64) -> bool {
        match principal {
            Principal::User(user) => {
                if user == self.owner {
                    return true;
                }

                if let Some(entry) = self.entries.get(&(user, kind)) {
                    if entry.is_active(now) {
                        return true;
                    }
                }

                // User shares imply read
                kind == PermissionKind::Read
                    && self
                        .by_recipient
                        .get(&user)
                        .and_then(|id| self.shares.get(id))
                        .is_some_and(|share| !share.is_expired(now))
            }
            Principal::Link(share_id) => {
                kind == PermissionKind::Read
                    && self
                        .shares
                        .get(&share_id)
                        .is_some_and(|share| share.is_link() && !share.is_expired(now))
            }
        }
    }

    /// Whether `principal` owns the file. No entry or share confers this.
    pub fn owns(&self, principal: Principal) -> bool {
        principal == Principal::User(self.owner)
    }
}

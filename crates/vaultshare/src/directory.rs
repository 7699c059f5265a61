//! User lookup.
//!
//! Users are owned by an external subsystem. The vault only needs to know
//! whether an id exists and which id an email address belongs to.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use vaultshare_core::UserId;

/// Read access to the external user subsystem.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether `user` exists.
    async fn user_exists(&self, user: UserId) -> anyhow::Result<bool>;

    /// Look up a user by email address.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserId>>;
}

/// Accepts every user id and knows no email addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

#[async_trait]
impl UserDirectory for OpenDirectory {
    async fn user_exists(&self, _user: UserId) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<UserId>> {
        Ok(None)
    }
}

/// A fixed in-process directory.
///
/// Emails are matched case-insensitively.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    inner: RwLock<StaticDirectoryInner>,
}

#[derive(Debug, Default)]
struct StaticDirectoryInner {
    users: HashSet<UserId>,
    emails: HashMap<String, UserId>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user.
    pub fn insert(&self, user: UserId, email: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.users.insert(user);
        inner.emails.insert(email.to_ascii_lowercase(), user);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_user(self, user: UserId, email: &str) -> Self {
        self.insert(user, email);
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn user_exists(&self, user: UserId) -> anyhow::Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned"))?;
        Ok(inner.users.contains(&user))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserId>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned"))?;
        Ok(inner.emails.get(&email.to_ascii_lowercase()).copied())
    }
}

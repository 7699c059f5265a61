//! The Vault: unified API for encrypted file storage and sharing.
//!
//! The Vault brings together storage, key derivation, encryption and the
//! access model. Operations are spread over several modules:
//!
//! - `files`: upload, download, delete, listing
//! - `versions`: new versions, restore, history
//! - `sharing`: permission grants, link and user shares, revocation
//! - `access`: the authorization gate every path goes through
//! - `content`: sealing and opening on blocking threads

use std::sync::Arc;

use vaultshare_core::{Clock, SystemClock};
use vaultshare_perms::{ContentSealer, SecretRegistry, TokenSigner};
use vaultshare_store::Store;

use crate::config::VaultConfig;
use crate::directory::{OpenDirectory, UserDirectory};
use crate::error::Result;
use crate::events::{EventSink, NoopSink, VaultEvent};

/// The main Vault struct.
///
/// Cheap to share: wrap it in an `Arc` and call it from as many tasks as
/// needed. All mutable state lives in the store.
pub struct Vault<S: Store> {
    /// The storage backend.
    pub(crate) store: Arc<S>,
    /// Seals and opens content under derived keys.
    pub(crate) sealer: ContentSealer,
    /// Issues and verifies share tokens.
    pub(crate) tokens: TokenSigner,
    /// Configuration.
    pub(crate) config: VaultConfig,
    pub(crate) directory: Arc<dyn UserDirectory>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<S: Store> Vault<S> {
    /// Create a vault over `store`.
    ///
    /// Uses the system clock, accepts every user id and drops events until
    /// told otherwise.
    pub fn new(store: S, secrets: SecretRegistry, config: VaultConfig) -> Result<Self> {
        Self::with_shared_store(Arc::new(store), secrets, config)
    }

    /// Create a vault over a store that is also used elsewhere.
    pub fn with_shared_store(
        store: Arc<S>,
        secrets: SecretRegistry,
        config: VaultConfig,
    ) -> Result<Self> {
        config.validate()?;

        let secrets = Arc::new(secrets);
        Ok(Self {
            store,
            sealer: ContentSealer::new(secrets.clone(), config.kdf),
            tokens: TokenSigner::new(secrets, config.share_link_max_age_millis()),
            config,
            directory: Arc::new(OpenDirectory),
            events: Arc::new(NoopSink),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `directory` for user lookups.
    pub fn with_directory(mut self, directory: impl UserDirectory + 'static) -> Self {
        self.directory = Arc::new(directory);
        self
    }

    /// Send events to `sink`.
    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Arc::new(sink);
        self
    }

    /// Read time from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Current time in Unix milliseconds.
    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Publish an event; failures are logged and dropped.
    pub(crate) fn emit(&self, event: VaultEvent) {
        if let Err(err) = self.events.publish(&event) {
            tracing::warn!(
                file_id = %event.file_id(),
                error = %err,
                "event sink rejected event"
            );
        }
    }
}

//! Relay service facade
//!
//! Single entry point a front-end (bot command handler, CLI, admin
//! panel) talks to. Wraps a shared store and the loaded configuration,
//! and owns starting the background poller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::lifecycle;
use crate::mailbox::MailboxAdapter;
use crate::models::{AccountId, Alias, MessageId, StoredMessage};
use crate::notify::Notifier;
use crate::poller::{PollerHandle, spawn_poller};
use crate::query::{self, InboxPage};
use crate::storage::{RelayStore, SqliteRelayStore, StoreStats};

/// Database filename in the relay config directory
const DATABASE_FILE: &str = "relay.sqlite";

pub struct RelayService {
    store: Arc<dyn RelayStore>,
    config: RelayConfig,
}

impl RelayService {
    pub fn new(store: Arc<dyn RelayStore>, config: RelayConfig) -> Self {
        Self { store, config }
    }

    /// Open the default on-disk store under the config directory
    pub fn open(config: RelayConfig) -> Result<Self> {
        config::init().context("Failed to create config directory")?;
        let path =
            config::config_path(DATABASE_FILE).context("Could not determine config directory")?;
        let store = SqliteRelayStore::new(&path)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Create an alias; a `None` local-part gets a generated name
    ///
    /// `ttl` of `None` means the alias never expires; a set ttl must be
    /// positive, so an expiry always lies strictly after creation.
    pub fn create_alias(
        &self,
        account: AccountId,
        local_part: Option<&str>,
        ttl: Option<chrono::Duration>,
    ) -> Result<Alias, RelayError> {
        if ttl.is_some_and(|ttl| ttl <= chrono::Duration::zero()) {
            return Err(RelayError::InvalidTtl);
        }
        let expires_at = ttl.map(|ttl| Utc::now() + ttl);
        match local_part {
            Some(local_part) => lifecycle::create_named_alias(
                self.store.as_ref(),
                account,
                local_part,
                &self.config.domain,
                self.config.daily_limit,
                expires_at,
            ),
            None => lifecycle::create_generated_alias(
                self.store.as_ref(),
                account,
                &self.config.domain,
                self.config.daily_limit,
                expires_at,
            ),
        }
    }

    pub fn list_aliases(&self, account: AccountId) -> Result<Vec<Alias>, RelayError> {
        lifecycle::list_aliases(self.store.as_ref(), account)
    }

    pub fn delete_alias(&self, account: AccountId, local_part: &str) -> Result<(), RelayError> {
        lifecycle::delete_alias(self.store.as_ref(), account, local_part)
    }

    pub fn list_inbox(
        &self,
        account: AccountId,
        local_part: &str,
        page: usize,
        page_size: usize,
    ) -> Result<InboxPage, RelayError> {
        query::list_inbox(self.store.as_ref(), account, local_part, page, page_size)
    }

    pub fn get_message(
        &self,
        account: AccountId,
        id: &MessageId,
    ) -> Result<StoredMessage, RelayError> {
        query::get_message(self.store.as_ref(), account, id)
    }

    pub fn stats(&self) -> Result<StoreStats, RelayError> {
        Ok(self.store.stats()?)
    }

    /// Start the background poller against the configured domain
    pub fn start_poller(
        &self,
        adapter: Arc<dyn MailboxAdapter>,
        notifier: Arc<dyn Notifier>,
    ) -> PollerHandle {
        spawn_poller(
            adapter,
            Arc::clone(&self.store),
            notifier,
            self.config.domain.clone(),
            Duration::from_secs(self.config.poll_interval_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRelayStore;

    fn test_service() -> RelayService {
        let config = RelayConfig::from_json(
            r#"{ "domain": "example.com", "daily_limit": 2 }"#,
        )
        .unwrap();
        RelayService::new(Arc::new(InMemoryRelayStore::new()), config)
    }

    #[test]
    fn test_create_list_delete_roundtrip() {
        let service = test_service();
        let account = AccountId::new(7);

        let alias = service.create_alias(account, Some("mine"), None).unwrap();
        assert_eq!(alias.address, "mine@example.com");

        let listed = service.list_aliases(account).unwrap();
        assert_eq!(listed.len(), 1);

        service.delete_alias(account, "mine").unwrap();
        assert!(service.list_aliases(account).unwrap().is_empty());
    }

    #[test]
    fn test_quota_from_config() {
        let service = test_service();
        let account = AccountId::new(7);
        service.create_alias(account, Some("one"), None).unwrap();
        service.create_alias(account, None, None).unwrap();

        let err = service.create_alias(account, Some("three"), None).unwrap_err();
        assert!(matches!(err, RelayError::QuotaExceeded { limit: 2 }));
    }

    #[test]
    fn test_ttl_sets_expiry() {
        let service = test_service();
        let alias = service
            .create_alias(AccountId::new(7), Some("brief"), Some(chrono::Duration::hours(1)))
            .unwrap();
        // Expiry lies strictly after creation
        assert!(alias.expires_at.is_some_and(|at| at > alias.created_at));
        assert!(!alias.is_expired(Utc::now()));
        assert!(alias.is_expired(Utc::now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let service = test_service();
        let account = AccountId::new(7);

        for ttl in [chrono::Duration::zero(), chrono::Duration::seconds(-5)] {
            let err = service.create_alias(account, Some("short"), Some(ttl)).unwrap_err();
            assert!(matches!(err, RelayError::InvalidTtl));
        }

        // The rejections had no side effect
        assert!(service.list_aliases(account).unwrap().is_empty());
    }
}

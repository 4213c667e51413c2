//! Read-side queries
//!
//! Paged inbox listings and full-message reads, scoped to the owning
//! account. Ownership misses and absent rows both surface as
//! [`RelayError::NotFound`] so callers cannot probe for other
//! accounts' aliases.

use crate::error::RelayError;
use crate::models::{AccountId, Alias, MessageId, MessageSummary, StoredMessage};
use crate::storage::RelayStore;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One page of an alias's inbox, newest first
#[derive(Debug, Clone)]
pub struct InboxPage {
    pub alias: Alias,
    pub entries: Vec<MessageSummary>,
    /// Zero-based page index
    pub page: usize,
    pub page_size: usize,
    /// Total messages for the alias, across all pages
    pub total: usize,
}

impl InboxPage {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.page_size.max(1))
    }
}

/// Resolve a local-part to an alias the account owns
fn owned_alias(
    store: &dyn RelayStore,
    account: AccountId,
    local_part: &str,
) -> Result<Alias, RelayError> {
    match store.get_alias_by_local_part(local_part)? {
        Some(alias) if alias.account == account => Ok(alias),
        _ => Err(RelayError::NotFound {
            resource: format!("alias {local_part}"),
        }),
    }
}

/// List one page of an account's alias inbox
pub fn list_inbox(
    store: &dyn RelayStore,
    account: AccountId,
    local_part: &str,
    page: usize,
    page_size: usize,
) -> Result<InboxPage, RelayError> {
    let alias = owned_alias(store, account, local_part)?;
    let (entries, total) = store.list_inbox(alias.id, page, page_size)?;
    Ok(InboxPage {
        alias,
        entries,
        page,
        page_size,
        total,
    })
}

/// Read a stored message in full, decompressed, if the account owns
/// the alias it was delivered to
pub fn get_message(
    store: &dyn RelayStore,
    account: AccountId,
    id: &MessageId,
) -> Result<StoredMessage, RelayError> {
    let message = store.get_message(id)?.ok_or_else(|| RelayError::NotFound {
        resource: format!("message {}", id.as_str()),
    })?;
    match store.get_alias(message.alias_id)? {
        Some(alias) if alias.account == account => Ok(message),
        _ => Err(RelayError::NotFound {
            resource: format!("message {}", id.as_str()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{AccountId, IncomingMessage, NewAlias};
    use crate::storage::{CreateAliasOutcome, InMemoryRelayStore, RelayStore};

    const DOMAIN: &str = "example.com";

    fn seeded_store() -> InMemoryRelayStore {
        let store = InMemoryRelayStore::new();
        let outcome = store
            .create_alias(NewAlias::new(AccountId::new(1), "mine", DOMAIN, None), 5)
            .unwrap();
        assert!(matches!(outcome, CreateAliasOutcome::Created(_)));
        for i in 0..7 {
            store
                .ingest_message(IncomingMessage {
                    id: MessageId::new(format!("<m{i}@src>")),
                    local_part: "mine".to_string(),
                    sender: "alice@example.org".to_string(),
                    subject: format!("Subject {i}"),
                    body: format!("Body {i}"),
                    received_at: Utc::now(),
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_inbox_paging() {
        let store = seeded_store();
        let first = list_inbox(&store, AccountId::new(1), "mine", 0, 5).unwrap();
        assert_eq!(first.entries.len(), 5);
        assert_eq!(first.total, 7);
        assert_eq!(first.total_pages(), 2);
        // Newest first
        assert_eq!(first.entries[0].subject, "Subject 6");

        let second = list_inbox(&store, AccountId::new(1), "mine", 1, 5).unwrap();
        assert_eq!(second.entries.len(), 2);
        assert_eq!(second.entries[1].subject, "Subject 0");
    }

    #[test]
    fn test_inbox_requires_ownership() {
        let store = seeded_store();
        let err = list_inbox(&store, AccountId::new(2), "mine", 0, 5).unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));
    }

    #[test]
    fn test_get_message_scoped_to_owner() {
        let store = seeded_store();
        let id = MessageId::new("<m3@src>");

        let message = get_message(&store, AccountId::new(1), &id).unwrap();
        assert_eq!(message.body, "Body 3");

        let err = get_message(&store, AccountId::new(2), &id).unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));

        let err = get_message(&store, AccountId::new(1), &MessageId::new("<nope@src>"))
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));
    }
}

//! In-memory storage implementation
//!
//! Used for testing and as a stub where durable storage is not needed.
//! A single `Mutex` around the whole state plays the role the
//! `Mutex<Connection>` plays in the SQLite store: every operation,
//! compound or not, runs under one exclusive lock.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::traits::{CreateAliasOutcome, IngestOutcome, RelayStore, StoreStats};
use crate::models::{
    AccountId, Alias, AliasId, IncomingMessage, MessageId, MessageSummary, NewAlias, StoredMessage,
    body_preview,
};

struct StoredEntry {
    message: StoredMessage,
    /// Arrival sequence number, tie-break for identical timestamps
    seq: u64,
}

#[derive(Default)]
struct Inner {
    next_alias_id: i64,
    next_seq: u64,
    aliases: HashMap<i64, Alias>,
    by_local_part: HashMap<String, i64>,
    messages: HashMap<String, StoredEntry>,
}

/// In-memory implementation of [`RelayStore`]
#[derive(Default)]
pub struct InMemoryRelayStore {
    inner: Mutex<Inner>,
}

impl InMemoryRelayStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelayStore for InMemoryRelayStore {
    fn create_alias(&self, new: NewAlias, daily_limit: u32) -> Result<CreateAliasOutcome> {
        let mut inner = self.inner.lock().unwrap();

        let created_today = inner
            .aliases
            .values()
            .filter(|a| a.account == new.account && a.created_on == new.created_on())
            .count();
        if created_today >= daily_limit as usize {
            return Ok(CreateAliasOutcome::QuotaExceeded);
        }

        if inner.by_local_part.contains_key(&new.local_part) {
            return Ok(CreateAliasOutcome::NameTaken);
        }

        inner.next_alias_id += 1;
        let alias = Alias {
            id: AliasId::new(inner.next_alias_id),
            account: new.account,
            created_on: new.created_on(),
            local_part: new.local_part,
            address: new.address,
            created_at: new.created_at,
            expires_at: new.expires_at,
        };

        inner
            .by_local_part
            .insert(alias.local_part.clone(), alias.id.as_i64());
        inner.aliases.insert(alias.id.as_i64(), alias.clone());

        Ok(CreateAliasOutcome::Created(alias))
    }

    fn list_aliases(&self, account: AccountId) -> Result<Vec<Alias>> {
        let inner = self.inner.lock().unwrap();

        let mut aliases: Vec<Alias> = inner
            .aliases
            .values()
            .filter(|a| a.account == account)
            .cloned()
            .collect();
        aliases.sort_by_key(|a| a.id.as_i64());

        Ok(aliases)
    }

    fn get_alias(&self, id: AliasId) -> Result<Option<Alias>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.aliases.get(&id.as_i64()).cloned())
    }

    fn get_alias_by_local_part(&self, local_part: &str) -> Result<Option<Alias>> {
        let inner = self.inner.lock().unwrap();

        Ok(inner
            .by_local_part
            .get(local_part)
            .and_then(|id| inner.aliases.get(id))
            .cloned())
    }

    fn delete_alias(&self, account: AccountId, local_part: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();

        let Some(&id) = inner.by_local_part.get(local_part) else {
            return Ok(false);
        };
        let owned = inner
            .aliases
            .get(&id)
            .is_some_and(|a| a.account == account);
        if !owned {
            return Ok(false);
        }

        inner.aliases.remove(&id);
        inner.by_local_part.remove(local_part);
        inner
            .messages
            .retain(|_, entry| entry.message.alias_id.as_i64() != id);

        Ok(true)
    }

    fn delete_expired_aliases(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();

        let expired: Vec<Alias> = inner
            .aliases
            .values()
            .filter(|a| a.is_expired(now))
            .cloned()
            .collect();

        for alias in &expired {
            inner.aliases.remove(&alias.id.as_i64());
            inner.by_local_part.remove(&alias.local_part);
            inner
                .messages
                .retain(|_, entry| entry.message.alias_id != alias.id);
        }

        Ok(expired.len())
    }

    fn ingest_message(&self, incoming: IncomingMessage) -> Result<IngestOutcome> {
        let mut inner = self.inner.lock().unwrap();

        if inner.messages.contains_key(incoming.id.as_str()) {
            return Ok(IngestOutcome::Duplicate);
        }

        let Some(alias) = inner
            .by_local_part
            .get(&incoming.local_part)
            .and_then(|id| inner.aliases.get(id))
            .cloned()
        else {
            return Ok(IngestOutcome::NoOwner);
        };

        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.messages.insert(
            incoming.id.as_str().to_string(),
            StoredEntry {
                message: StoredMessage {
                    id: incoming.id,
                    alias_id: alias.id,
                    sender: incoming.sender,
                    subject: incoming.subject,
                    body: incoming.body,
                    received_at: incoming.received_at,
                },
                seq,
            },
        );

        Ok(IngestOutcome::Inserted { alias })
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.contains_key(id.as_str()))
    }

    fn list_inbox(
        &self,
        alias_id: AliasId,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<MessageSummary>, usize)> {
        let inner = self.inner.lock().unwrap();

        let mut entries: Vec<(&StoredMessage, u64)> = inner
            .messages
            .values()
            .filter(|e| e.message.alias_id == alias_id)
            .map(|e| (&e.message, e.seq))
            .collect();
        let total = entries.len();

        // Newest first
        entries.sort_by(|(a, sa), (b, sb)| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| sb.cmp(sa))
        });

        let summaries = entries
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .map(|(m, _)| MessageSummary {
                id: m.id.clone(),
                sender: m.sender.clone(),
                subject: m.subject.clone(),
                body_preview: body_preview(&m.body),
                received_at: m.received_at,
            })
            .collect();

        Ok((summaries, total))
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<StoredMessage>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.get(id.as_str()).map(|e| e.message.clone()))
    }

    fn count_messages_for_alias(&self, alias_id: AliasId) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .values()
            .filter(|e| e.message.alias_id == alias_id)
            .count())
    }

    fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.lock().unwrap();

        let accounts = inner
            .aliases
            .values()
            .map(|a| a.account)
            .collect::<std::collections::HashSet<_>>()
            .len();

        Ok(StoreStats {
            accounts,
            aliases: inner.aliases.len(),
            messages: inner.messages.len(),
        })
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        *inner = Inner::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_alias(account: i64, local_part: &str) -> NewAlias {
        NewAlias::new(AccountId::new(account), local_part, "example.com", None)
    }

    fn make_incoming(id: &str, local_part: &str) -> IncomingMessage {
        IncomingMessage {
            id: MessageId::new(id),
            local_part: local_part.to_string(),
            sender: "sender@example.org".to_string(),
            subject: "Subject".to_string(),
            body: "Body".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_quota_and_conflict() {
        let store = InMemoryRelayStore::new();

        for i in 0..2 {
            let outcome = store
                .create_alias(make_alias(1, &format!("box{}", i)), 2)
                .unwrap();
            assert!(matches!(outcome, CreateAliasOutcome::Created(_)));
        }

        let outcome = store.create_alias(make_alias(1, "box2"), 2).unwrap();
        assert!(matches!(outcome, CreateAliasOutcome::QuotaExceeded));

        let outcome = store.create_alias(make_alias(2, "box0"), 2).unwrap();
        assert!(matches!(outcome, CreateAliasOutcome::NameTaken));
    }

    #[test]
    fn test_ingest_and_cascade() {
        let store = InMemoryRelayStore::new();

        let CreateAliasOutcome::Created(alias) =
            store.create_alias(make_alias(1, "tester"), 5).unwrap()
        else {
            panic!("create failed");
        };

        store.ingest_message(make_incoming("<m1>", "tester")).unwrap();
        let outcome = store.ingest_message(make_incoming("<m1>", "tester")).unwrap();
        assert!(matches!(outcome, IngestOutcome::Duplicate));
        assert_eq!(store.count_messages_for_alias(alias.id).unwrap(), 1);
        assert!(store.get_alias(alias.id).unwrap().is_some());

        assert!(store.delete_alias(AccountId::new(1), "tester").unwrap());
        assert!(store.get_alias(alias.id).unwrap().is_none());
        assert!(store.get_message(&MessageId::new("<m1>")).unwrap().is_none());
    }

    #[test]
    fn test_expiry_sweep_removes_messages() {
        let store = InMemoryRelayStore::new();

        let now = Utc::now();
        let expiring = NewAlias::new(
            AccountId::new(1),
            "old",
            "example.com",
            Some(now + Duration::seconds(1)),
        );
        store.create_alias(expiring, 5).unwrap();
        store.ingest_message(make_incoming("<m1>", "old")).unwrap();

        assert_eq!(
            store.delete_expired_aliases(now + Duration::seconds(2)).unwrap(),
            1
        );
        assert!(store.get_alias_by_local_part("old").unwrap().is_none());
        assert!(store.get_message(&MessageId::new("<m1>")).unwrap().is_none());
    }
}

//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{
    AccountId, Alias, AliasId, IncomingMessage, MessageId, MessageSummary, NewAlias, StoredMessage,
};

/// Result of attempting to create an alias
///
/// Quota and uniqueness checks run inside the same exclusive section as
/// the insert, so these outcomes are race-free by construction.
#[derive(Debug, Clone)]
pub enum CreateAliasOutcome {
    Created(Alias),
    /// The account already created `daily_limit` aliases today
    QuotaExceeded,
    /// The local-part is already taken
    NameTaken,
}

/// Result of attempting to ingest one parsed message
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// A new row was written, bound to the owning alias
    Inserted { alias: Alias },
    /// A row with this message identifier already exists
    Duplicate,
    /// No alias owns the recipient local-part; the message is dropped
    NoOwner,
}

/// Aggregate counts for the admin view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Distinct accounts owning at least one alias
    pub accounts: usize,
    pub aliases: usize,
    pub messages: usize,
}

/// Trait for relay storage operations
///
/// Every method is one atomic unit with respect to every other method:
/// implementations serialize all access through a single exclusive lock,
/// and compound read-check-write sequences (quota check + insert,
/// dedup check + ownership lookup + insert) never release it mid-way.
pub trait RelayStore: Send + Sync {
    /// Insert a new alias, enforcing the per-account daily quota
    ///
    /// The uniqueness violation is detected at insert time, not
    /// pre-checked, so generated-name collisions fall through to
    /// [`CreateAliasOutcome::NameTaken`].
    fn create_alias(&self, new: NewAlias, daily_limit: u32) -> Result<CreateAliasOutcome>;

    /// List aliases owned by an account, in creation order
    fn list_aliases(&self, account: AccountId) -> Result<Vec<Alias>>;

    /// Look up an alias by row identifier
    fn get_alias(&self, id: AliasId) -> Result<Option<Alias>>;

    /// Look up the alias owning a local-part
    fn get_alias_by_local_part(&self, local_part: &str) -> Result<Option<Alias>>;

    /// Delete an alias owned by `account`; cascades to its messages
    ///
    /// Returns `false` when no alias matched (non-existent or not owned
    /// by this account) — no partial effects in that case.
    fn delete_alias(&self, account: AccountId, local_part: &str) -> Result<bool>;

    /// Delete every alias whose expiry is non-null and `<= now`
    ///
    /// Returns the number of aliases removed.
    fn delete_expired_aliases(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Dedup-check, resolve ownership, and insert in one atomic step
    fn ingest_message(&self, incoming: IncomingMessage) -> Result<IngestOutcome>;

    /// Check whether a message identifier is already stored
    fn has_message(&self, id: &MessageId) -> Result<bool>;

    /// List one page of an alias's inbox, newest first
    ///
    /// Returns the page plus the total message count for the alias.
    fn list_inbox(
        &self,
        alias_id: AliasId,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<MessageSummary>, usize)>;

    /// Fetch a stored message with its full body
    fn get_message(&self, id: &MessageId) -> Result<Option<StoredMessage>>;

    /// Count messages delivered to an alias
    fn count_messages_for_alias(&self, alias_id: AliasId) -> Result<usize>;

    /// Aggregate counts for the admin view
    fn stats(&self) -> Result<StoreStats>;

    /// Clear all data (for testing)
    fn clear(&self) -> Result<()>;
}

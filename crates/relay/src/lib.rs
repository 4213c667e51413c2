//! Relay crate - Disposable mailbox alias relay core
//!
//! This crate provides the engine behind a disposable-address service
//! for a single domain's catch-all mailbox:
//! - Domain models (Alias, stored messages, typed identifiers)
//! - Raw RFC822/MIME parsing and recipient routing
//! - Storage trait abstractions with SQLite and in-memory backends
//! - Idempotent ingestion engine with message-identifier dedup
//! - Quota-gated alias lifecycle with expiry sweeps
//! - Query API for inbox pages and full-message reads
//! - Best-effort chat notification dispatch
//! - Background fixed-interval poll scheduler
//!
//! This crate has zero front-end dependencies; a bot command handler
//! or CLI wraps [`RelayService`].

pub mod config;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod mailbox;
pub mod models;
pub mod notify;
pub mod parser;
pub mod poller;
pub mod query;
pub mod service;
pub mod storage;

pub use config::{MailboxConfig, RelayConfig, TelegramConfig};
pub use error::RelayError;
pub use ingest::{CycleStats, run_cycle};
pub use lifecycle::{create_generated_alias, create_named_alias, expire_sweep, validate_local_part};
pub use mailbox::{CandidateFilter, CandidateRef, MailboxAdapter, MailboxSession};
pub use models::{
    AccountId, Alias, AliasId, IncomingMessage, MessageId, MessageSummary, NewAlias, StoredMessage,
};
pub use notify::{LogNotifier, NotificationIntent, Notifier, TelegramNotifier};
pub use parser::{ParseSkip, ParsedMessage, parse_message};
pub use poller::{PollerHandle, spawn_poller};
pub use query::{InboxPage, get_message, list_inbox};
pub use service::RelayService;
pub use storage::{
    CreateAliasOutcome, InMemoryRelayStore, IngestOutcome, RelayStore, SqliteRelayStore, StoreStats,
};

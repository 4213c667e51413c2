//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for aliases and
//! their ingested messages. The trait-based design allows swapping
//! between in-memory and persistent implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryRelayStore;
pub use sqlite::SqliteRelayStore;
pub use traits::{CreateAliasOutcome, IngestOutcome, RelayStore, StoreStats};

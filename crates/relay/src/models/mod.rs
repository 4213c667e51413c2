//! Domain models for the relay core

mod alias;
mod message;

pub use alias::{AccountId, Alias, AliasId, NewAlias};
pub use message::{IncomingMessage, MessageId, MessageSummary, StoredMessage};

pub(crate) use message::body_preview;

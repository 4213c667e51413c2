//! Message model representing one ingested mail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AliasId;

/// Maximum characters kept in a summary body preview
const PREVIEW_MAX_CHARS: usize = 120;

/// Server-assigned unique message identifier (transport `Message-ID`)
///
/// This is the deduplication key: a message is ingested at most once
/// regardless of how many poll cycles list the same server content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A parsed message handed to the store for ownership routing
///
/// Carries the recipient local-part rather than an alias reference:
/// the store resolves ownership and binds the row atomically.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: MessageId,
    /// Local-part of the recipient address, used to look up the owner
    pub local_part: String,
    /// Sender display string (decoded `From` header)
    pub sender: String,
    pub subject: String,
    /// Plaintext body; empty when the message had no text/plain part
    pub body: String,
    /// Ingestion time, not the header `Date`
    pub received_at: DateTime<Utc>,
}

/// A message as persisted, bound to its owning alias
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub alias_id: AliasId,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// Inbox listing entry: metadata plus a short body preview, no full body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub sender: String,
    pub subject: String,
    pub body_preview: String,
    pub received_at: DateTime<Utc>,
}

/// Derive a one-line preview from a message body
pub(crate) fn body_preview(body: &str) -> String {
    let first_line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    first_line.chars().take(PREVIEW_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_first_nonempty_line() {
        assert_eq!(body_preview("\n\n  \nhello world\nsecond"), "hello world");
    }

    #[test]
    fn test_preview_empty_body() {
        assert_eq!(body_preview(""), "");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(body_preview(&long).chars().count(), PREVIEW_MAX_CHARS);
    }
}

//! Mailbox poll adapter contract
//!
//! The relay polls a shared catch-all mailbox through this boundary.
//! The concrete protocol client (IMAP or otherwise) lives outside the
//! core; any step may fail, and a failure aborts only the current poll
//! cycle.

use anyhow::Result;

/// Which candidates a poll cycle asks the source for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateFilter {
    /// Only messages the source has not yet flagged as seen
    UnseenOnly,
    /// Everything currently in the source
    All,
}

/// Opaque server-side reference to one candidate message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRef(pub String);

impl CandidateRef {
    pub fn new(r: impl Into<String>) -> Self {
        Self(r.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One connected session against the mail source
///
/// The same underlying message may be listed on multiple cycles
/// (at-least-once delivery); the ingestion engine deduplicates by
/// message identifier, not by trusting this contract.
pub trait MailboxSession {
    /// List candidate message references matching the filter
    fn list_candidates(&mut self, filter: CandidateFilter) -> Result<Vec<CandidateRef>>;

    /// Fetch the raw bytes of one candidate
    fn fetch_raw(&mut self, candidate: &CandidateRef) -> Result<Vec<u8>>;

    /// Flag a candidate as processed on the source
    fn mark_processed(&mut self, candidate: &CandidateRef) -> Result<()>;

    /// Disconnect; best-effort
    fn close(&mut self) -> Result<()>;
}

/// Factory for per-cycle sessions
pub trait MailboxAdapter: Send + Sync {
    /// Open a fresh session; each poll cycle connects anew
    fn connect(&self) -> Result<Box<dyn MailboxSession>>;
}

//! Ingestion engine
//!
//! Runs one poll cycle against the mailbox adapter: list candidates,
//! then for each candidate fetch, parse, dedup-check, route to the
//! owning alias, persist, and emit a notification intent. Per-message
//! failures are contained at the message level; only connect/list
//! failures abort the cycle.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::mailbox::{CandidateFilter, CandidateRef, MailboxAdapter, MailboxSession};
use crate::models::IncomingMessage;
use crate::notify::{NotificationIntent, Notifier};
use crate::parser::parse_message;
use crate::storage::{IngestOutcome, RelayStore};

/// Statistics from one poll cycle
#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    /// Candidates listed by the source
    pub candidates: usize,
    /// New messages stored and notified
    pub ingested: usize,
    /// Candidates whose message identifier was already stored
    pub duplicates: usize,
    /// Parsed messages whose recipient owns no alias
    pub unroutable: usize,
    /// Candidates skipped by the parser (malformed, no Message-ID, foreign)
    pub skipped: usize,
    /// Fetch or store errors
    pub errors: usize,
    /// Duration of the cycle
    pub duration_ms: u64,
}

/// How one candidate ended up
enum CandidateOutcome {
    Ingested,
    Duplicate,
    NoOwner,
    Skipped,
    Error,
}

/// Run one poll cycle
///
/// Idempotent: re-running over the same source content stores nothing
/// new, because deduplication keys on the message identifier.
pub fn run_cycle(
    adapter: &dyn MailboxAdapter,
    store: &dyn RelayStore,
    notifier: &dyn Notifier,
    domain: &str,
    filter: CandidateFilter,
) -> Result<CycleStats> {
    let start = std::time::Instant::now();
    let mut stats = CycleStats::default();

    let mut session = adapter.connect().context("Failed to connect to mailbox")?;

    let candidates = match session.list_candidates(filter) {
        Ok(candidates) => candidates,
        Err(e) => {
            let _ = session.close();
            return Err(e.context("Failed to list candidates"));
        }
    };
    stats.candidates = candidates.len();

    // One message at a time to completion; two messages for the same
    // alias are never interleaved.
    for candidate in &candidates {
        match ingest_one(session.as_mut(), store, notifier, domain, candidate) {
            CandidateOutcome::Ingested => stats.ingested += 1,
            CandidateOutcome::Duplicate => stats.duplicates += 1,
            CandidateOutcome::NoOwner => stats.unroutable += 1,
            CandidateOutcome::Skipped => stats.skipped += 1,
            CandidateOutcome::Error => stats.errors += 1,
        }
    }

    if let Err(e) = session.close() {
        log::warn!("[INGEST] Failed to close mailbox session: {e:#}");
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Process a single candidate; every failure degrades to a counted
/// outcome so the rest of the batch proceeds
fn ingest_one(
    session: &mut dyn MailboxSession,
    store: &dyn RelayStore,
    notifier: &dyn Notifier,
    domain: &str,
    candidate: &CandidateRef,
) -> CandidateOutcome {
    let raw = match session.fetch_raw(candidate) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("[INGEST] Failed to fetch {}: {e:#}", candidate.as_str());
            return CandidateOutcome::Error;
        }
    };

    let parsed = match parse_message(&raw, domain) {
        Ok(parsed) => parsed,
        Err(skip) => {
            log::warn!("[INGEST] Skipping {}: {}", candidate.as_str(), skip);
            mark_processed(session, candidate);
            return CandidateOutcome::Skipped;
        }
    };

    let incoming = IncomingMessage {
        id: parsed.message_id.clone(),
        local_part: parsed.local_part,
        sender: parsed.sender.clone(),
        subject: parsed.subject.clone(),
        body: parsed.body,
        // Ingestion time, not the header Date: keeps arrival order
        // monotonic within an alias's inbox
        received_at: Utc::now(),
    };

    // Dedup check, ownership lookup, and insert are one atomic store
    // operation; a concurrent alias deletion cannot orphan the row.
    let outcome = match store.ingest_message(incoming) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("[INGEST] Failed to store {}: {e:#}", parsed.message_id.as_str());
            return CandidateOutcome::Error;
        }
    };

    mark_processed(session, candidate);

    match outcome {
        IngestOutcome::Inserted { alias } => {
            // Fire-and-forget: delivery failure never rolls back the insert
            notifier.notify(NotificationIntent {
                account: alias.account,
                alias_address: alias.address,
                sender: parsed.sender,
                subject: parsed.subject,
                message_id: parsed.message_id,
            });
            CandidateOutcome::Ingested
        }
        IngestOutcome::Duplicate => CandidateOutcome::Duplicate,
        IngestOutcome::NoOwner => {
            log::debug!(
                "[INGEST] No alias owns recipient of {}, dropping",
                parsed.message_id.as_str()
            );
            CandidateOutcome::NoOwner
        }
    }
}

fn mark_processed(session: &mut dyn MailboxSession, candidate: &CandidateRef) {
    if let Err(e) = session.mark_processed(candidate) {
        log::warn!(
            "[INGEST] Failed to mark {} processed: {e:#}",
            candidate.as_str()
        );
    }
}

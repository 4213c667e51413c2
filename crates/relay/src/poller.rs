//! Background poll scheduler
//!
//! Runs the ingestion cycle and expiry sweep on a dedicated thread at
//! a fixed interval. Cycle failures are logged and the loop continues;
//! only an explicit stop ends it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;

use crate::ingest::run_cycle;
use crate::lifecycle::expire_sweep;
use crate::mailbox::{CandidateFilter, MailboxAdapter};
use crate::notify::Notifier;
use crate::storage::RelayStore;

/// Granularity of shutdown checks while sleeping between cycles
const SLEEP_STEP: Duration = Duration::from_millis(250);

/// Handle to a running poller thread
pub struct PollerHandle {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller to stop and wait for the current cycle to finish
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.handle.join().is_err() {
            log::error!("[POLL] Poller thread panicked");
        }
    }
}

/// Spawn the poll loop on a dedicated thread
///
/// Each tick runs one ingestion cycle followed by the alias expiry
/// sweep, then sleeps `interval` before the next tick.
pub fn spawn_poller(
    adapter: Arc<dyn MailboxAdapter>,
    store: Arc<dyn RelayStore>,
    notifier: Arc<dyn Notifier>,
    domain: String,
    interval: Duration,
) -> PollerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = std::thread::spawn(move || {
        log::info!("[POLL] Poller started, interval {}s", interval.as_secs());
        while !shutdown_flag.load(Ordering::SeqCst) {
            match run_cycle(
                adapter.as_ref(),
                store.as_ref(),
                notifier.as_ref(),
                &domain,
                CandidateFilter::UnseenOnly,
            ) {
                Ok(stats) => {
                    if stats.candidates > 0 {
                        log::info!(
                            "[POLL] Cycle done: {} candidates, {} ingested, {} duplicates, {} unroutable, {} skipped, {} errors in {}ms",
                            stats.candidates,
                            stats.ingested,
                            stats.duplicates,
                            stats.unroutable,
                            stats.skipped,
                            stats.errors,
                            stats.duration_ms
                        );
                    }
                }
                Err(e) => log::error!("[POLL] Cycle failed: {e:#}"),
            }

            if let Err(e) = expire_sweep(store.as_ref(), Utc::now()) {
                log::error!("[POLL] Expiry sweep failed: {e}");
            }

            sleep_interruptible(interval, &shutdown_flag);
        }
        log::info!("[POLL] Poller stopped");
    });

    PollerHandle { shutdown, handle }
}

fn sleep_interruptible(interval: Duration, shutdown: &AtomicBool) {
    let mut remaining = interval;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let step = remaining.min(SLEEP_STEP);
        std::thread::sleep(step);
        remaining -= step;
    }
}

//! Periodic archiving of completed tasks.
//!
//! A sweep sets `archived = true, archivedAt = now` on every completed,
//! not yet archived task in one statement. Children are not touched.

use crate::db::{Database, now};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Shortest period the loop accepts; `interval_at` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Result of a single sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran and archived this many tasks.
    Archived(usize),
    /// Another sweep was already running.
    Skipped,
    /// The store returned an error; logged, retried next tick.
    Failed,
}

/// Runs archive sweeps against the store, one at a time.
pub struct Archiver {
    db: Arc<Database>,
    running: AtomicBool,
}

impl Archiver {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            running: AtomicBool::new(false),
        }
    }

    /// Run one sweep. Never returns an error: failures are logged.
    pub fn run_once(&self) -> SweepOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Archive sweep already in progress, skipping");
            return SweepOutcome::Skipped;
        }

        let outcome = match self.db.archive_completed(now()) {
            Ok(0) => {
                debug!("Archive sweep found no completed tasks");
                SweepOutcome::Archived(0)
            }
            Ok(count) => {
                info!(count, "Archived completed tasks");
                SweepOutcome::Archived(count)
            }
            Err(e) => {
                error!(error = %e, "Error archiving completed tasks");
                SweepOutcome::Failed
            }
        };

        self.running.store(false, Ordering::Release);
        outcome
    }

    /// Whether a sweep is currently executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start the periodic loop on the current tokio runtime.
    ///
    /// The first sweep happens one full `period` after start. Periods below
    /// one millisecond are raised to one millisecond.
    pub fn spawn(self: Arc<Self>, period: Duration) -> ArchiverHandle {
        let period = period.max(MIN_PERIOD);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_secs = period.as_secs_f64(), "Archiver started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Running automated archiving sweep");
                        let archiver = Arc::clone(&self);
                        if let Err(e) = tokio::task::spawn_blocking(move || archiver.run_once()).await {
                            error!(error = %e, "Archive sweep task panicked");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Archiver stopped");
        });

        ArchiverHandle { shutdown_tx, task }
    }
}

/// Handle for stopping the periodic archiver.
pub struct ArchiverHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ArchiverHandle {
    /// Signal the loop to stop and wait for it to finish.
    ///
    /// A sweep already in flight completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Archiver task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

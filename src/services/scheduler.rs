use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::StoreResult;
use crate::models::{Watch, WatchChanges, WatchId};
use crate::services::scan_processor::{ScanOutcome, WatchProcessor};
use crate::services::schedule::ScanCadence;
use crate::storage::WatchRepository;

/// Counters for one scheduler iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    pub expired: usize,
}

struct LoopHandle {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Background loop that scans due watches and advances their schedules.
///
/// Stopping is cooperative: `stop` only prevents the next iteration, an
/// in-flight batch always runs to completion.
pub struct Scheduler {
    watches: Arc<dyn WatchRepository>,
    processor: Arc<dyn WatchProcessor>,
    cadence: ScanCadence,
    interval: Duration,
    handle: Mutex<Option<LoopHandle>>,
}

impl Scheduler {
    pub fn new(
        watches: Arc<dyn WatchRepository>,
        processor: Arc<dyn WatchProcessor>,
        cadence: ScanCadence,
        interval: Duration,
    ) -> Self {
        Self {
            watches,
            processor,
            cadence,
            interval,
            handle: Mutex::new(None),
        }
    }

    fn handle(&self) -> MutexGuard<'_, Option<LoopHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launch the loop on the runtime. Returns `false` if it already runs.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut slot = self.handle();
        if slot
            .as_ref()
            .is_some_and(|h| h.running.load(Ordering::SeqCst))
        {
            debug!("Scheduler already running");
            return false;
        }

        // A stopped loop still finishing its batch holds its own flag.
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(Arc::clone(self).run(Arc::clone(&running), Arc::clone(&wake)));

        *slot = Some(LoopHandle {
            running,
            wake,
            task,
        });
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        true
    }

    /// Ask the loop to exit before its next iteration. Returns `false` if it
    /// was not running.
    pub fn stop(&self) -> bool {
        let slot = self.handle();
        match slot.as_ref() {
            Some(h) if h.running.swap(false, Ordering::SeqCst) => {
                h.wake.notify_one();
                info!("Scheduler stop requested");
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle()
            .as_ref()
            .is_some_and(|h| h.running.load(Ordering::SeqCst))
    }

    /// Stop the loop and wait until its current batch has finished.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.task.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }

    async fn run(self: Arc<Self>, running: Arc<AtomicBool>, wake: Arc<Notify>) {
        while running.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(report) if report.due > 0 => info!(
                    due = report.due,
                    completed = report.completed,
                    failed = report.failed,
                    expired = report.expired,
                    "Scheduler iteration complete"
                ),
                Ok(_) => debug!("No watches due"),
                Err(e) => error!("Failed to query due watches, retrying next iteration: {}", e),
            }

            if !running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = wake.notified() => {}
            }
        }
        debug!("Scheduler loop exited");
    }

    pub async fn tick(&self) -> StoreResult<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// One iteration: process every watch due at `now`, one after another.
    ///
    /// Only the due-watch query can fail the iteration; per-watch failures
    /// are counted and logged.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> StoreResult<TickReport> {
        let due = self.watches.find_due(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };
        if !due.is_empty() {
            info!(count = due.len(), "Processing due watches");
        }

        for watch in due {
            match self.run_watch(watch, now).await {
                None => report.expired += 1,
                Some(ScanOutcome::Completed { .. }) => report.completed += 1,
                Some(ScanOutcome::Failed { .. }) => report.failed += 1,
            }
        }
        Ok(report)
    }

    /// Process one watch immediately, whether or not it is due.
    ///
    /// Returns `None` when the watch does not exist, has expired or is
    /// paused. Paused and expired watches are left untouched.
    pub async fn scan_now(&self, id: &WatchId) -> StoreResult<Option<ScanOutcome>> {
        self.scan_now_at(id, Utc::now()).await
    }

    pub async fn scan_now_at(
        &self,
        id: &WatchId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ScanOutcome>> {
        let Some(watch) = self.watches.get(id).await? else {
            return Ok(None);
        };
        if !watch.status.is_scheduled() {
            info!(watch_id = %watch.id, status = %watch.status, "Watch is not scheduled, skipping scan");
            return Ok(None);
        }
        Ok(self.run_watch(watch, now).await)
    }

    /// Expire or scan a watch, then advance its schedule.
    async fn run_watch(&self, watch: Watch, now: DateTime<Utc>) -> Option<ScanOutcome> {
        if watch.is_expired_at(now) {
            info!(watch_id = %watch.id, expires_at = %watch.expires_at, "Watch expired, not scanning");
            if let Err(e) = self.watches.update(&watch.id, WatchChanges::expire(now)).await {
                error!(watch_id = %watch.id, "Failed to mark watch expired: {}", e);
            }
            return None;
        }

        let processor = Arc::clone(&self.processor);
        let scanned = watch.clone();
        let outcome = match tokio::spawn(async move { processor.process_at(&scanned, now).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(watch_id = %watch.id, "Scan task aborted: {}", e);
                ScanOutcome::Failed {
                    error: format!("scan task aborted: {e}"),
                }
            }
        };

        // Advanced whether or not the scan succeeded.
        let next_scan_at = self.cadence.next_scan_at(watch.frequency, now);
        match self
            .watches
            .update(&watch.id, WatchChanges::reschedule(next_scan_at, now))
            .await
        {
            Ok(true) => debug!(watch_id = %watch.id, %next_scan_at, "Next scan scheduled"),
            Ok(false) => warn!(watch_id = %watch.id, "Watch deleted during scan"),
            Err(e) => error!(watch_id = %watch.id, "Failed to schedule next scan: {}", e),
        }

        Some(outcome)
    }
}

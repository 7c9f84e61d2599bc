use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::models::{CandidateListing, ScanLog, ScanResult, Watch, WatchChanges, WatchStatus};
use crate::notification::{AlertMessage, NotificationGateway};
use crate::services::availability::AvailabilityChecker;
use crate::storage::{ScanLogSink, UserDirectory, WatchRepository};

/// What one scan tick did
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed { result: ScanResult, notified: bool },
    Failed { error: String },
}

/// Runs one watch's scan tick. Implementations contain their own failures.
#[async_trait]
pub trait WatchProcessor: Send + Sync {
    async fn process_at(&self, watch: &Watch, now: DateTime<Utc>) -> ScanOutcome;
}

/// Check availability, record the attempt, alert the owner if the property
/// became bookable and write the scan state back to the watch.
///
/// The scan log is appended before any alert goes out, and the watch record
/// is written last, so the cooldown check always sees the previous alert
/// time.
pub struct ScanProcessor {
    checker: AvailabilityChecker,
    gateway: NotificationGateway,
    watches: Arc<dyn WatchRepository>,
    scan_logs: Arc<dyn ScanLogSink>,
    users: Arc<dyn UserDirectory>,
    cooldown: Duration,
}

impl ScanProcessor {
    pub fn new(
        checker: AvailabilityChecker,
        gateway: NotificationGateway,
        watches: Arc<dyn WatchRepository>,
        scan_logs: Arc<dyn ScanLogSink>,
        users: Arc<dyn UserDirectory>,
        cooldown: Duration,
    ) -> Self {
        Self {
            checker,
            gateway,
            watches,
            scan_logs,
            users,
            cooldown,
        }
    }

    pub async fn process(&self, watch: &Watch) -> ScanOutcome {
        self.process_at(watch, Utc::now()).await
    }

    async fn append_log(&self, log: ScanLog) {
        let watch_id = log.watch_id.clone();
        if let Err(e) = self.scan_logs.append(log).await {
            error!(watch_id = %watch_id, "Failed to write scan log: {}", e);
        }
    }

    async fn update_watch(&self, watch: &Watch, changes: WatchChanges) {
        match self.watches.update(&watch.id, changes).await {
            Ok(true) => {}
            Ok(false) => warn!(watch_id = %watch.id, "Watch disappeared during scan"),
            Err(e) => error!(watch_id = %watch.id, "Failed to update watch after scan: {}", e),
        }
    }

    /// Alert the owner unless one went out within the cooldown.
    ///
    /// Returns whether a dispatch was attempted.
    async fn notify(
        &self,
        watch: &Watch,
        matched: Option<&CandidateListing>,
        now: DateTime<Utc>,
    ) -> bool {
        info!(watch_id = %watch.id, "Property available, preparing notification");

        // The stored record is authoritative for the last alert time.
        let last_sent = match self.watches.get(&watch.id).await {
            Ok(Some(current)) => current.last_notification_sent,
            Ok(None) => {
                warn!(watch_id = %watch.id, "Watch no longer exists, skipping notification");
                return false;
            }
            Err(e) => {
                error!(watch_id = %watch.id, "Failed to read watch before notifying: {}", e);
                return false;
            }
        };

        if let Some(last_sent) = last_sent {
            let elapsed = now - last_sent;
            if elapsed < self.cooldown {
                info!(
                    watch_id = %watch.id,
                    hours_since_last = elapsed.num_minutes() as f64 / 60.0,
                    cooldown_hours = self.cooldown.num_hours(),
                    "Skipping notification (cooldown)"
                );
                return false;
            }
        }

        let user = match self.users.get_user(&watch.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                error!(watch_id = %watch.id, user_id = %watch.user_id, "Owner not found");
                return false;
            }
            Err(e) => {
                error!(watch_id = %watch.id, user_id = %watch.user_id, "Failed to load owner: {}", e);
                return false;
            }
        };

        let message = AlertMessage::property_available(watch, matched);
        let results = self
            .gateway
            .dispatch(&user, &message.body, Some(&message.subject))
            .await;
        info!(watch_id = %watch.id, ?results, "Notification dispatched");
        true
    }
}

#[async_trait]
impl WatchProcessor for ScanProcessor {
    async fn process_at(&self, watch: &Watch, now: DateTime<Utc>) -> ScanOutcome {
        let started = tokio::time::Instant::now();
        info!(watch_id = %watch.id, property = %watch.property_name, "Processing scan");

        let checked = self.checker.check(watch).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (result, matched) = match checked {
            Ok(verdict) => verdict,
            Err(e) => {
                let message = e.to_string();
                error!(watch_id = %watch.id, elapsed_ms, "Scan failed: {}", message);

                self.append_log(ScanLog::error(watch, message.clone(), elapsed_ms, now))
                    .await;
                self.update_watch(
                    watch,
                    WatchChanges {
                        status: Some(WatchStatus::Error),
                        error_message: Some(Some(message.clone())),
                        last_scanned_at: Some(Some(now)),
                        updated_at: Some(now),
                        ..Default::default()
                    },
                )
                .await;
                return ScanOutcome::Failed { error: message };
            }
        };

        self.append_log(ScanLog::success(watch, result, elapsed_ms, now))
            .await;

        let notified = if result == ScanResult::Available {
            self.notify(watch, matched.as_ref(), now).await
        } else {
            false
        };

        self.update_watch(
            watch,
            WatchChanges {
                status: Some(WatchStatus::Active),
                error_message: Some(None),
                last_scanned_at: Some(Some(now)),
                last_notification_sent: notified.then_some(Some(now)),
                updated_at: Some(now),
                ..Default::default()
            },
        )
        .await;

        info!(watch_id = %watch.id, ?result, elapsed_ms, notified, "Scan complete");
        ScanOutcome::Completed { result, notified }
    }
}

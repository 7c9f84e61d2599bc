//! Persistence boundaries of the scan pipeline.
//!
//! The pipeline only sees these traits; `LocalStore` is the bundled
//! implementation backing the command-line binary.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use local::LocalStore;

use crate::error::{StoreResult, WatchError};
use crate::models::{ScanLog, UserContact, UserId, Watch, WatchChanges, WatchId};

/// Durable store of watch records
#[async_trait]
pub trait WatchRepository: Send + Sync {
    /// Watches the scheduler should process at `now`: scheduled status and
    /// `next_scan_at <= now`, oldest due first.
    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Watch>>;

    async fn get(&self, id: &WatchId) -> StoreResult<Option<Watch>>;

    /// Apply a partial update to one watch. Returns `false` if it no longer
    /// exists.
    async fn update(&self, id: &WatchId, changes: WatchChanges) -> StoreResult<bool>;

    async fn count_active(&self, user_id: &UserId) -> StoreResult<usize>;

    async fn insert(&self, watch: Watch) -> StoreResult<WatchId>;

    async fn delete(&self, id: &WatchId) -> StoreResult<bool>;

    async fn list_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Watch>>;

    /// Insert an active watch unless its owner already has `limit` active
    /// watches.
    ///
    /// The default is a plain count followed by an insert, which two
    /// concurrent callers can both pass. Stores that can do better override
    /// it.
    async fn insert_within_limit(&self, watch: Watch, limit: usize) -> Result<WatchId, WatchError> {
        if self.count_active(&watch.user_id).await? >= limit {
            return Err(WatchError::LimitReached { limit });
        }
        Ok(self.insert(watch).await?)
    }
}

/// Append-only sink for scan audit records
#[async_trait]
pub trait ScanLogSink: Send + Sync {
    async fn append(&self, log: ScanLog) -> StoreResult<()>;
}

/// Read access to recipients' contact details
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: &UserId) -> StoreResult<Option<UserContact>>;
}

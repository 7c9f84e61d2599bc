use std::fmt;

use serde::{Deserialize, Serialize};

pub mod listing;
pub mod scan_log;
pub mod user;
pub mod watch;

pub use listing::{room_id_from_url, CandidateListing};
pub use scan_log::{ScanLog, ScanResult, ScanStatus};
pub use user::{Channel, ChannelPreferences, UserContact};
pub use watch::{Frequency, NewWatch, Watch, WatchChanges, WatchStatus};

/// Opaque identifier of a watch record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(String);

impl WatchId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WatchId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WatchId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the user owning a watch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{UserId, WatchId};

/// Scan cadence tier of a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Frequency {
    Daily,
    /// Also the reading of records whose frequency is missing or unknown
    #[default]
    Hourly,
    Sniper,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Hourly => "hourly",
            Frequency::Sniper => "sniper",
        }
    }

    /// Parses a stored frequency, treating anything unrecognised as hourly.
    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(frequency = value, "Unknown frequency, defaulting to hourly");
            Frequency::Hourly
        })
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "hourly" => Ok(Frequency::Hourly),
            "sniper" => Ok(Frequency::Sniper),
            other => Err(format!(
                "frequency must be one of: daily, hourly, sniper (got '{other}')"
            )),
        }
    }
}

impl From<String> for Frequency {
    fn from(value: String) -> Self {
        Frequency::from_str_lossy(&value)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a watch. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Active,
    Paused,
    Expired,
    Error,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Active => "active",
            WatchStatus::Paused => "paused",
            WatchStatus::Expired => "expired",
            WatchStatus::Error => "error",
        }
    }

    /// Whether the scheduler keeps selecting watches in this state.
    ///
    /// Errored watches stay on their cadence so that a transient provider
    /// failure is retried at the next due time.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, WatchStatus::Active | WatchStatus::Error)
    }
}

impl FromStr for WatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(WatchStatus::Active),
            "paused" => Ok(WatchStatus::Paused),
            "expired" => Ok(WatchStatus::Expired),
            "error" => Ok(WatchStatus::Error),
            other => Err(format!(
                "status must be one of: active, paused, expired, error (got '{other}')"
            )),
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's standing request to monitor one property for one date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub id: WatchId,
    pub user_id: UserId,

    // Search criteria. Name, price and image are display-only.
    pub property_id: String,
    pub property_name: String,
    pub property_url: String,
    pub location: String,
    pub image_url: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guests: u32,
    pub price: String,
    #[serde(default)]
    pub partial_match: bool,

    // Scheduling state
    #[serde(default)]
    pub frequency: Frequency,
    pub status: WatchStatus,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub next_scan_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,

    // Notification state
    #[serde(default)]
    pub last_notification_sent: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Watch {
    /// End of the check-in day; monitoring is pointless after that.
    pub fn expires_at_for(check_in: NaiveDate) -> DateTime<Utc> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&check_in.and_time(end_of_day))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_scheduled() && self.next_scan_at.is_some_and(|next| next <= now)
    }
}

/// User-supplied fields of a watch about to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWatch {
    pub property_id: String,
    pub property_name: String,
    pub property_url: String,
    pub location: String,
    pub image_url: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guests: u32,
    pub price: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub partial_match: bool,
}

/// Partial update applied atomically to a single watch record.
///
/// Outer `None` leaves a field untouched; for nullable fields the inner
/// `Option` is the new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchChanges {
    pub status: Option<WatchStatus>,
    pub frequency: Option<Frequency>,
    pub partial_match: Option<bool>,
    pub last_scanned_at: Option<Option<DateTime<Utc>>>,
    pub next_scan_at: Option<Option<DateTime<Utc>>>,
    pub last_notification_sent: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WatchChanges {
    /// Schedule advance written by the scheduler after every tick.
    pub fn reschedule(next_scan_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            next_scan_at: Some(Some(next_scan_at)),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    pub fn expire(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(WatchStatus::Expired),
            next_scan_at: Some(None),
            updated_at: Some(now),
            ..Default::default()
        }
    }

    pub fn apply(&self, watch: &mut Watch) {
        if let Some(status) = self.status {
            watch.status = status;
        }
        if let Some(frequency) = self.frequency {
            watch.frequency = frequency;
        }
        if let Some(partial_match) = self.partial_match {
            watch.partial_match = partial_match;
        }
        if let Some(value) = self.last_scanned_at {
            watch.last_scanned_at = value;
        }
        if let Some(value) = self.next_scan_at {
            watch.next_scan_at = value;
        }
        if let Some(value) = self.last_notification_sent {
            watch.last_notification_sent = value;
        }
        if let Some(value) = &self.error_message {
            watch.error_message = value.clone();
        }
        if let Some(updated_at) = self.updated_at {
            watch.updated_at = updated_at;
        }
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Watch, WatchId};

/// Outcome of the scan operation itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Success,
    Failed,
    Error,
}

/// Availability verdict of a successful scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Available,
    Unavailable,
    PartialMatch,
}

/// Immutable audit record of one scan attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanLog {
    pub watch_id: WatchId,
    pub status: ScanStatus,
    /// Only present when `status` is `Success`.
    pub result: Option<ScanResult>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScanLog {
    pub fn success(
        watch: &Watch,
        result: ScanResult,
        response_time_ms: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            watch_id: watch.id.clone(),
            status: ScanStatus::Success,
            result: Some(result),
            check_in: watch.check_in_date,
            check_out: watch.check_out_date,
            response_time_ms,
            error_message: None,
            created_at,
        }
    }

    pub fn error(
        watch: &Watch,
        message: impl Into<String>,
        response_time_ms: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            watch_id: watch.id.clone(),
            status: ScanStatus::Error,
            result: None,
            check_in: watch.check_in_date,
            check_out: watch.check_out_date,
            response_time_ms,
            error_message: Some(message.into()),
            created_at,
        }
    }
}

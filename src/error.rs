//! Error types for the scan pipeline and its collaborators.

use thiserror::Error;

use crate::models::{UserId, WatchId};

/// Failures raised by an availability provider.
///
/// These are never swallowed by the availability checker; the scan
/// processor records them as an errored scan.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider run failed: {0}")]
    RunFailed(String),

    #[error("provider timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// Failures of the watch repository, scan log sink or user directory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Rejections from watch management operations.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("maximum of {limit} active watches allowed; delete or pause an existing watch")]
    LimitReached { limit: usize },

    #[error("invalid watch: {0}")]
    Invalid(String),

    #[error("watch not found: {0}")]
    NotFound(WatchId),

    #[error("watch {watch} is not owned by user {user}")]
    NotOwner { watch: WatchId, user: UserId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

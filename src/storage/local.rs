use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult, WatchError};
use crate::models::{ScanLog, UserContact, UserId, Watch, WatchChanges, WatchId, WatchStatus};
use crate::storage::{ScanLogSink, UserDirectory, WatchRepository};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    watches: BTreeMap<WatchId, Watch>,
    #[serde(default)]
    users: BTreeMap<UserId, UserContact>,
}

/// On-disk layout of a file-backed store.
///
/// `<data>` holds watches and users as one JSON snapshot, `<data>.lock`
/// serialises access between processes, and `<data stem>.scans.jsonl` is
/// the append-only scan history.
#[derive(Debug)]
struct StoreFiles {
    snapshot: PathBuf,
    lock: PathBuf,
    scan_log: PathBuf,
}

impl StoreFiles {
    fn new(snapshot: PathBuf) -> Self {
        Self {
            lock: with_suffix(&snapshot, ".lock"),
            scan_log: snapshot.with_extension("scans.jsonl"),
            snapshot,
        }
    }

    /// Exclusive advisory lock on the data file, released when dropped
    async fn lock(&self) -> StoreResult<std::fs::File> {
        let path = self.lock.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("lock task failed: {e}")))?
    }

    async fn load(&self) -> StoreResult<StoreState> {
        match tokio::fs::read(&self.snapshot).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &StoreState) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = with_suffix(&self.snapshot, ".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.snapshot).await?;
        debug!(path = %self.snapshot.display(), "Store snapshot written");
        Ok(())
    }

    async fn append_log(&self, log: &ScanLog) -> StoreResult<()> {
        let mut line = serde_json::to_vec(log)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.scan_log)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_logs(&self) -> StoreResult<Vec<ScanLog>> {
        let text = match tokio::fs::read_to_string(&self.scan_log).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut logs = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(log) => logs.push(log),
                Err(e) => warn!(
                    path = %self.scan_log.display(),
                    line = index + 1,
                    "Skipping unreadable scan log entry: {}",
                    e
                ),
            }
        }
        Ok(logs)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("bnb-alerts"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Store for watches, scan logs and users, in memory or backed by files.
///
/// A file-backed store re-reads the snapshot under the file lock for every
/// operation, so several processes can share one data file. Mutations run
/// on a copy of the latest state that replaces the current one only after
/// it has been written.
pub struct LocalStore {
    state: Mutex<StoreState>,
    memory_logs: Mutex<Vec<ScanLog>>,
    files: Option<StoreFiles>,
}

impl LocalStore {
    /// Memory-only store, used by tests
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            memory_logs: Mutex::new(Vec::new()),
            files: None,
        }
    }

    /// Use the data file at `path`, starting empty if it does not exist yet.
    ///
    /// The snapshot is read once here so a corrupt file fails at startup.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let files = StoreFiles::new(path.as_ref().to_path_buf());
        let state = {
            let _lock = files.lock().await?;
            files.load().await?
        };
        info!(
            path = %files.snapshot.display(),
            watches = state.watches.len(),
            "Opened data file"
        );

        Ok(Self {
            state: Mutex::new(state),
            memory_logs: Mutex::new(Vec::new()),
            files: Some(files),
        })
    }

    /// Run `read` against the latest state.
    async fn view<T, F>(&self, read: F) -> StoreResult<T>
    where
        F: FnOnce(&StoreState) -> T + Send,
    {
        let mut state = self.state.lock().await;
        if let Some(files) = &self.files {
            let _lock = files.lock().await?;
            *state = files.load().await?;
        }
        Ok(read(&state))
    }

    /// Run `mutate` on a copy of the latest state. It returns its result and
    /// whether it changed anything; changes are kept only once written.
    async fn modify<T, F>(&self, mutate: F) -> StoreResult<T>
    where
        F: FnOnce(&mut StoreState) -> (T, bool) + Send,
        T: Send,
    {
        let mut state = self.state.lock().await;
        let _lock = match &self.files {
            Some(files) => Some(files.lock().await?),
            None => None,
        };
        let mut next = match &self.files {
            Some(files) => files.load().await?,
            None => state.clone(),
        };

        let (output, changed) = mutate(&mut next);
        if changed {
            if let Some(files) = &self.files {
                files.save(&next).await?;
            }
        }
        *state = next;
        Ok(output)
    }

    pub async fn upsert_user(&self, user: UserContact) -> StoreResult<()> {
        self.modify(|state| {
            state.users.insert(user.id.clone(), user);
            ((), true)
        })
        .await
    }

    /// Scan history of one watch, oldest first
    pub async fn scan_logs_for(&self, id: &WatchId) -> StoreResult<Vec<ScanLog>> {
        let logs = match &self.files {
            Some(files) => files.read_logs().await?,
            None => self.memory_logs.lock().await.clone(),
        };
        Ok(logs.into_iter().filter(|log| &log.watch_id == id).collect())
    }
}

fn active_count(state: &StoreState, user_id: &UserId) -> usize {
    state
        .watches
        .values()
        .filter(|w| &w.user_id == user_id && w.status == WatchStatus::Active)
        .count()
}

#[async_trait]
impl WatchRepository for LocalStore {
    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Watch>> {
        self.view(|state| {
            let mut due: Vec<Watch> = state
                .watches
                .values()
                .filter(|w| w.is_due_at(now))
                .cloned()
                .collect();
            due.sort_by_key(|w| w.next_scan_at);
            due
        })
        .await
    }

    async fn get(&self, id: &WatchId) -> StoreResult<Option<Watch>> {
        self.view(|state| state.watches.get(id).cloned()).await
    }

    async fn update(&self, id: &WatchId, changes: WatchChanges) -> StoreResult<bool> {
        self.modify(|state| match state.watches.get_mut(id) {
            Some(watch) => {
                changes.apply(watch);
                (true, true)
            }
            None => (false, false),
        })
        .await
    }

    async fn count_active(&self, user_id: &UserId) -> StoreResult<usize> {
        self.view(|state| active_count(state, user_id)).await
    }

    async fn insert(&self, watch: Watch) -> StoreResult<WatchId> {
        self.modify(|state| {
            let id = watch.id.clone();
            state.watches.insert(id.clone(), watch);
            (id, true)
        })
        .await
    }

    async fn delete(&self, id: &WatchId) -> StoreResult<bool> {
        self.modify(|state| {
            let removed = state.watches.remove(id).is_some();
            (removed, removed)
        })
        .await
    }

    async fn list_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Watch>> {
        self.view(|state| {
            let mut watches: Vec<Watch> = state
                .watches
                .values()
                .filter(|w| &w.user_id == user_id)
                .cloned()
                .collect();
            watches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            watches
        })
        .await
    }

    // Count and insert under the same lock.
    async fn insert_within_limit(&self, watch: Watch, limit: usize) -> Result<WatchId, WatchError> {
        self.modify(|state| {
            if active_count(state, &watch.user_id) >= limit {
                return (Err(WatchError::LimitReached { limit }), false);
            }
            let id = watch.id.clone();
            state.watches.insert(id.clone(), watch);
            (Ok(id), true)
        })
        .await?
    }
}

#[async_trait]
impl ScanLogSink for LocalStore {
    async fn append(&self, log: ScanLog) -> StoreResult<()> {
        match &self.files {
            Some(files) => files.append_log(&log).await,
            None => {
                self.memory_logs.lock().await.push(log);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl UserDirectory for LocalStore {
    async fn get_user(&self, id: &UserId) -> StoreResult<Option<UserContact>> {
        self.view(|state| state.users.get(id).cloned()).await
    }
}

//! Persisted run state: the seen-identity set and the last-alert marker.
//!
//! Both artifacts are small and rewritten whole at the end of a run. Writes go
//! to a sibling temporary file first and are then renamed over the target, so
//! an interrupted run leaves either the old or the new snapshot, never a torn
//! one.
//!
//! ```text
//! state_dir/
//! ├── seen.json        # ["olx:3f2a…", "seap:CN1001", …]
//! └── last_alert.txt   # 2025-05-06T12:34:56.123456Z
//! ```

use crate::error::StateError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Durable set of identities that have already been reported.
///
/// Grows monotonically; nothing is ever evicted.
#[derive(Debug, Default, Clone)]
pub struct SeenStore {
    seen: HashSet<String>,
}

impl SeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path`. A missing file is an empty store; an
    /// unreadable or corrupt file is an error, since carrying on with an empty
    /// store would re-report everything.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, StateError> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No seen snapshot yet; starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let ids: Vec<String> = serde_json::from_slice(&raw).map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            seen: ids.into_iter().collect(),
        };
        info!(count = store.len(), "Loaded seen snapshot");
        Ok(store)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    /// Insert `identity`; returns `true` if it was not present before.
    pub fn add(&mut self, identity: impl Into<String>) -> bool {
        self.seen.insert(identity.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Sorted copy of every identity, for persistence.
    pub fn snapshot(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.seen.iter().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Atomically replace the snapshot at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), count = self.len()))]
    pub async fn persist(&self, path: &Path) -> Result<(), StateError> {
        let json = serde_json::to_vec(&self.snapshot()).map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &json).await?;
        info!("Persisted seen snapshot");
        Ok(())
    }
}

/// Write the last-alert marker: `at` as UTC ISO-8601 with microseconds.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_last_alert(path: &Path, at: DateTime<Utc>) -> Result<(), StateError> {
    let stamp = at.to_rfc3339_opts(SecondsFormat::Micros, true);
    write_atomic(path, stamp.as_bytes()).await?;
    info!(%stamp, "Wrote last-alert marker");
    Ok(())
}

/// Write `bytes` to a sibling temp file, flush it to disk, then rename it
/// over `path` and sync the directory entry.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StateError> {
    let write_err = |source| StateError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp = tmp_path(path);
    let mut file = File::create(&tmp).await.map_err(write_err)?;
    file.write_all(bytes).await.map_err(write_err)?;
    // Data must be durable before the rename makes it visible.
    file.sync_all().await.map_err(write_err)?;
    drop(file);
    fs::rename(&tmp, path).await.map_err(write_err)?;

    sync_dir(parent.unwrap_or(Path::new("."))).await;
    Ok(())
}

/// Persist a rename in `dir`. Directories cannot be opened for syncing on
/// every platform, so failures are only logged.
async fn sync_dir(dir: &Path) {
    match File::open(dir).await {
        Ok(handle) => {
            if let Err(e) = handle.sync_all().await {
                debug!(dir = %dir.display(), error = %e, "Directory sync failed");
            }
        }
        Err(e) => debug!(dir = %dir.display(), error = %e, "Directory open for sync failed"),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

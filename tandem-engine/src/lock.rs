//! Cross-invocation run lock
//!
//! Mutual exclusion between processes reconciling the same pair, via a
//! lock file keyed by the normalized pair. Acquisition relies on
//! create-new semantics; the file carries an owner token so release only
//! ever removes a lock this run created. A lock left behind by a dead
//! process is reclaimed once it is older than the configured age.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{EngineError, Result};

/// On-disk contents of a run lock
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockPayload {
    token: Uuid,
    acquired_at: DateTime<Utc>,
    pid: u32,
}

/// Proof of ownership of an acquired lock
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    token: Uuid,
}

/// Acquires and releases pair-keyed run locks under the state directory
pub struct LockManager {
    dir: PathBuf,
    max_age: Duration,
}

impl LockManager {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Try to acquire the lock for `key`. Returns `None` when another
    /// run holds it. A stale lock (older than `max_age`) is reclaimed
    /// with a warning.
    pub async fn acquire(&self, key: &str) -> Result<Option<LockHandle>> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{key}.lock"));

        match self.try_create(&path).await {
            Ok(handle) => Ok(Some(handle)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if self.is_stale(&path).await {
                    warn!(
                        "reclaiming stale lock {} (older than {:?})",
                        path.display(),
                        self.max_age
                    );
                    fs::remove_file(&path).await?;
                    match self.try_create(&path).await {
                        Ok(handle) => Ok(Some(handle)),
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
                        Err(e) => Err(e.into()),
                    }
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Release a held lock. The on-disk token must still match the
    /// handle; a mismatch means someone reclaimed the lock out from
    /// under us, and their file is left alone.
    pub async fn release(&self, handle: LockHandle) -> Result<()> {
        let bytes = fs::read(&handle.path).await?;
        let payload: LockPayload = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Lock(format!("unreadable lock payload: {e}")))?;

        if payload.token != handle.token {
            warn!(
                "lock {} no longer ours (token mismatch); leaving it in place",
                handle.path.display()
            );
            return Ok(());
        }

        fs::remove_file(&handle.path).await?;
        debug!("released lock {}", handle.path.display());
        Ok(())
    }

    async fn try_create(&self, path: &Path) -> std::io::Result<LockHandle> {
        let payload = LockPayload {
            token: Uuid::new_v4(),
            acquired_at: Utc::now(),
            pid: std::process::id(),
        };
        let bytes = serde_json::to_vec_pretty(&payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!("acquired lock {}", path.display());
        Ok(LockHandle {
            path: path.to_path_buf(),
            token: payload.token,
        })
    }

    /// A lock is stale when its recorded acquisition time is older than
    /// `max_age`. An unreadable payload is treated as held, not stale.
    async fn is_stale(&self, path: &Path) -> bool {
        let Ok(bytes) = fs::read(path).await else {
            return false;
        };
        let Ok(payload) = serde_json::from_slice::<LockPayload>(&bytes) else {
            warn!("lock {} has unreadable payload; treating as held", path.display());
            return false;
        };
        let age = Utc::now().signed_duration_since(payload.acquired_at);
        age.to_std().map(|age| age > self.max_age).unwrap_or(false)
    }
}

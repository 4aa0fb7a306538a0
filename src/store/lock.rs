//! Cooperative cross-process lock for the data directory.
//!
//! The lock is a file created with exclusive-create semantics. It holds the
//! owner's pid, a per-acquisition token and the acquisition time so a lock
//! left behind by a crashed process can be recognised and broken once it is
//! older than the configured staleness threshold.
//!
//! Breaking is serialised through a second exclusive file (`<lock>.break`):
//! only the waiter holding it may inspect and remove a stale lock, so two
//! waiters can never both break the same lock and end up holding it at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::utils::error::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// A breaker file older than this was left by a waiter that died mid-break.
const BREAKER_STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    #[serde(default)]
    token: Uuid,
    acquired_at: DateTime<Utc>,
}

/// Held lock. The lock file is removed when the guard is dropped, unless it
/// has since been broken and taken over by someone else.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    token: Uuid,
}

impl StoreLock {
    pub async fn acquire(path: &Path, timeout: Duration, stale_after: Duration) -> Result<Self> {
        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            match Self::try_create(path).await {
                Ok(lock) => {
                    tracing::debug!("Acquired store lock {}", path.display());
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::break_if_stale(path, stale_after).await? {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Err(AppError::StoreBusy {
                    lock_path: path.to_path_buf(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn try_create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path).await?;
        // From here on the guard owns the file, so a failed write still cleans up.
        let lock = Self {
            path: path.to_path_buf(),
            token: Uuid::new_v4(),
        };

        let info = LockInfo {
            pid: std::process::id(),
            token: lock.token,
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec(&info).map_err(std::io::Error::other)?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        Ok(lock)
    }

    fn breaker_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".break");
        PathBuf::from(name)
    }

    /// Removes the lock file when its holder is gone for longer than
    /// `stale_after`. Returns true when the caller should retry creating the
    /// lock right away.
    async fn break_if_stale(path: &Path, stale_after: Duration) -> Result<bool> {
        let breaker = Self::breaker_path(path);
        match OpenOptions::new().write(true).create_new(true).open(&breaker).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Self::clear_abandoned_breaker(&breaker).await;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let outcome = Self::break_while_exclusive(path, stale_after).await;
        if let Err(e) = tokio::fs::remove_file(&breaker).await {
            tracing::warn!("Failed to remove lock breaker {}: {}", breaker.display(), e);
        }
        outcome
    }

    /// Runs with the breaker held: nobody else can remove the lock file, so
    /// what is read here is what gets removed.
    async fn break_while_exclusive(path: &Path, stale_after: Duration) -> Result<bool> {
        let acquired_at = match Self::holder(path).await {
            Some(info) => info.acquired_at,
            None => match Self::modified_at(path).await {
                Some(modified) => modified,
                // Released between our create attempt and now.
                None => return Ok(true),
            },
        };

        let age = Utc::now().signed_duration_since(acquired_at);
        let stale_after = chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::days(36_500));
        if age <= stale_after {
            return Ok(false);
        }

        tracing::warn!(
            "Breaking stale store lock {} (held since {}, {}s ago)",
            path.display(),
            acquired_at.to_rfc3339(),
            age.num_seconds()
        );
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_abandoned_breaker(breaker: &Path) {
        let Some(modified) = Self::modified_at(breaker).await else {
            return;
        };
        let age = Utc::now().signed_duration_since(modified);
        if age.to_std().is_ok_and(|age| age > BREAKER_STALE_AFTER) {
            tracing::warn!("Removing abandoned lock breaker {}", breaker.display());
            let _ = tokio::fs::remove_file(breaker).await;
        }
    }

    async fn holder(path: &Path) -> Option<LockInfo> {
        let body = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&body).ok()
    }

    async fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn still_owned(&self) -> bool {
        let Ok(body) = std::fs::read(&self.path) else {
            return false;
        };
        match serde_json::from_slice::<LockInfo>(&body) {
            Ok(info) => info.token == self.token,
            // Our own write never completed.
            Err(_) => body.is_empty(),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if !self.still_owned() {
            tracing::warn!(
                "Store lock {} was taken over while held; leaving it in place",
                self.path.display()
            );
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to release store lock {}: {}", self.path.display(), e);
            }
        }
    }
}

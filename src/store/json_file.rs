//! Whole-file JSON collections with atomic replacement.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::utils::error::{AppError, Result};

/// Reads a JSON array from `path`. A missing file is an empty collection;
/// anything unreadable as the expected array is `CorruptStore`.
pub async fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let body = match tokio::fs::read(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&body).map_err(|e| AppError::corrupt(path, e.to_string()))
}

/// A fully written and synced temp file waiting to replace its target.
///
/// Until [`StagedFile::commit`] runs the target is untouched, which is what a
/// crash between the two steps leaves behind.
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub async fn commit(mut self) -> Result<()> {
        tokio::fs::rename(&self.temp, &self.target).await?;
        self.committed = true;
        sync_parent(&self.target).await;
        Ok(())
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp);
        }
    }
}

/// Writes `items` as a pretty-printed array to a temp file next to `path`
/// and fsyncs it.
pub async fn stage<T: Serialize>(path: &Path, items: &[T]) -> Result<StagedFile> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Internal(format!("store path {} has no file name", path.display())))?;
    let temp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let mut body = serde_json::to_vec_pretty(items)?;
    body.push(b'\n');

    let staged = StagedFile {
        temp,
        target: path.to_path_buf(),
        committed: false,
    };
    let mut file = tokio::fs::File::create(&staged.temp).await?;
    file.write_all(&body).await?;
    file.sync_all().await?;

    Ok(staged)
}

pub async fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    stage(path, items).await?.commit().await
}

#[cfg(unix)]
async fn sync_parent(path: &Path) {
    let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return;
    };
    match tokio::fs::File::open(parent).await {
        Ok(dir) => {
            if let Err(e) = dir.sync_all().await {
                tracing::debug!("Directory sync of {} failed: {}", parent.display(), e);
            }
        }
        Err(e) => tracing::debug!("Could not open {} for sync: {}", parent.display(), e),
    }
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) {}

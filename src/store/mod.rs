//! JSON-file store for groups and tracked URLs.
//!
//! Reads never take the lock. Every read-modify-write cycle runs through
//! [`JsonStore::update`], which holds the data directory lock across a fresh
//! load, the mutation and the atomic save.

use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::models::{Group, UrlEntry};
use crate::utils::error::{AppError, Result};

pub mod json_file;
pub mod lock;
pub mod snapshot;

pub use lock::StoreLock;
pub use snapshot::{Collection, Inconsistency, StoreSnapshot};

#[derive(Debug, Clone)]
pub struct JsonStore {
    groups_path: PathBuf,
    urls_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    stale_lock_after: Duration,
}

impl JsonStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            groups_path: config.groups_path(),
            urls_path: config.urls_path(),
            lock_path: config.lock_path(),
            lock_timeout: config.lock_timeout(),
            stale_lock_after: config.stale_lock_after(),
        }
    }

    pub fn groups_path(&self) -> &PathBuf {
        &self.groups_path
    }

    pub fn urls_path(&self) -> &PathBuf {
        &self.urls_path
    }

    pub fn lock_path(&self) -> &PathBuf {
        &self.lock_path
    }

    pub async fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.lock_path, self.lock_timeout, self.stale_lock_after).await
    }

    /// Loads and validates both collections. Missing files load as empty.
    pub async fn load(&self) -> Result<StoreSnapshot> {
        let groups: Vec<Group> = json_file::read_collection(&self.groups_path).await?;
        let urls: Vec<UrlEntry> = json_file::read_collection(&self.urls_path).await?;
        let snapshot = StoreSnapshot::new(groups, urls);

        if let Err(inconsistency) = snapshot.check_consistency() {
            let path = match inconsistency.collection {
                Collection::Groups => &self.groups_path,
                Collection::Urls => &self.urls_path,
            };
            return Err(AppError::corrupt(path, inconsistency.reason));
        }
        Ok(snapshot)
    }

    /// Replaces the whole store with `snapshot` under the lock.
    ///
    /// The write is atomic, but anything committed since `snapshot` was
    /// loaded is overwritten. Use [`JsonStore::update`] to change the store
    /// based on its current contents.
    pub async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let _lock = self.lock().await?;
        let previous = self.load().await?;
        self.persist(&previous, snapshot).await
    }

    /// Locked load-mutate-save. An error from `mutate` aborts without writing.
    pub async fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut StoreSnapshot) -> Result<T>,
    {
        let _lock = self.lock().await?;
        let previous = self.load().await?;
        let mut next = previous.clone();
        let value = mutate(&mut next)?;
        self.persist(&previous, &next).await?;
        Ok(value)
    }

    /// Writes the collections that changed. When groups were removed the
    /// URL file goes first so a crash in between never leaves entries
    /// pointing at a missing group.
    async fn persist(&self, previous: &StoreSnapshot, next: &StoreSnapshot) -> Result<()> {
        if let Err(inconsistency) = next.check_consistency() {
            return Err(AppError::Internal(format!(
                "refusing to save inconsistent store: {}",
                inconsistency.reason
            )));
        }

        let groups_changed = previous.groups != next.groups;
        let urls_changed = previous.urls != next.urls;
        let groups_removed = previous
            .groups
            .iter()
            .any(|group| next.group(group.id).is_none());

        let groups = if groups_changed {
            Some(json_file::stage(&self.groups_path, &next.groups).await?)
        } else {
            None
        };
        let urls = if urls_changed {
            Some(json_file::stage(&self.urls_path, &next.urls).await?)
        } else {
            None
        };

        if groups_removed {
            if let Some(staged) = urls {
                staged.commit().await?;
            }
            if let Some(staged) = groups {
                staged.commit().await?;
            }
        } else {
            if let Some(staged) = groups {
                staged.commit().await?;
            }
            if let Some(staged) = urls {
                staged.commit().await?;
            }
        }

        tracing::debug!(
            "Saved store ({} groups, {} urls)",
            next.groups.len(),
            next.urls.len()
        );
        Ok(())
    }

    pub async fn add_group(&self, name: &str) -> Result<Group> {
        let group = self.update(|snapshot| snapshot.add_group(name)).await?;
        tracing::info!("Added group '{}' ({})", group.name, group.id);
        Ok(group)
    }

    pub async fn rename_group(&self, id: Uuid, name: &str) -> Result<Group> {
        self.update(|snapshot| snapshot.rename_group(id, name)).await
    }

    pub async fn delete_group(&self, id: Uuid) -> Result<Vec<UrlEntry>> {
        let removed = self.update(|snapshot| snapshot.delete_group(id)).await?;
        tracing::info!("Deleted group {} and {} tracked urls", id, removed.len());
        Ok(removed)
    }

    pub async fn add_url(&self, group_id: Uuid, url: &str, target_price: Option<f64>) -> Result<UrlEntry> {
        let entry = self
            .update(|snapshot| snapshot.add_url(group_id, url, target_price))
            .await?;
        tracing::info!("Tracking {} in group {}", entry.url, group_id);
        Ok(entry)
    }

    pub async fn update_url(&self, id: Uuid, url: &str) -> Result<UrlEntry> {
        self.update(|snapshot| snapshot.update_url(id, url)).await
    }

    pub async fn set_target_price(&self, id: Uuid, target_price: Option<f64>) -> Result<UrlEntry> {
        self.update(|snapshot| snapshot.set_target_price(id, target_price)).await
    }

    pub async fn delete_url(&self, id: Uuid) -> Result<UrlEntry> {
        self.update(|snapshot| snapshot.delete_url(id)).await
    }
}

use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    first_out_of_order, normalize_url, same_price, validate_target_price, Group, NewGroup, NewUrlEntry, UrlEntry,
};
use crate::utils::error::{AppError, Result};

/// Which collection a consistency problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Groups,
    Urls,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inconsistency {
    pub collection: Collection,
    pub reason: String,
}

impl Inconsistency {
    fn groups(reason: String) -> Self {
        Self {
            collection: Collection::Groups,
            reason,
        }
    }

    fn urls(reason: String) -> Self {
        Self {
            collection: Collection::Urls,
            reason,
        }
    }
}

/// In-memory copy of both collections. All mutations are pure; persisting is
/// the store's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub groups: Vec<Group>,
    pub urls: Vec<UrlEntry>,
}

impl StoreSnapshot {
    pub fn new(groups: Vec<Group>, urls: Vec<UrlEntry>) -> Self {
        Self { groups, urls }
    }

    pub fn group(&self, id: Uuid) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn entry(&self, id: Uuid) -> Option<&UrlEntry> {
        self.urls.iter().find(|entry| entry.id == id)
    }

    pub fn entry_mut(&mut self, id: Uuid) -> Option<&mut UrlEntry> {
        self.urls.iter_mut().find(|entry| entry.id == id)
    }

    pub fn entries_in_group(&self, group_id: Uuid) -> impl Iterator<Item = &UrlEntry> {
        self.urls.iter().filter(move |entry| entry.group_id == group_id)
    }

    /// Entries in processing order: group order, then entry order within
    /// the group.
    pub fn ordered_entries(&self) -> Vec<(&Group, &UrlEntry)> {
        self.groups
            .iter()
            .flat_map(|group| self.entries_in_group(group.id).map(move |entry| (group, entry)))
            .collect()
    }

    fn is_tracked(&self, group_id: Uuid, url: &str, except: Option<Uuid>) -> bool {
        self.entries_in_group(group_id)
            .filter(|entry| Some(entry.id) != except)
            .any(|entry| normalize_url(&entry.url).map_or_else(|_| entry.url == url, |existing| existing == url))
    }

    pub fn add_group(&mut self, name: &str) -> Result<Group> {
        let new_group = NewGroup::new(name);
        new_group.validate()?;
        let group = Group::new(new_group);
        self.groups.push(group.clone());
        Ok(group)
    }

    pub fn rename_group(&mut self, id: Uuid, name: &str) -> Result<Group> {
        let new_name = NewGroup::new(name);
        new_name.validate()?;
        let group = self
            .groups
            .iter_mut()
            .find(|group| group.id == id)
            .ok_or_else(|| AppError::not_found(format!("group {}", id)))?;
        group.rename(&new_name.name);
        Ok(group.clone())
    }

    /// Removes the group and every entry in it. Returns the removed entries.
    pub fn delete_group(&mut self, id: Uuid) -> Result<Vec<UrlEntry>> {
        let before = self.groups.len();
        self.groups.retain(|group| group.id != id);
        if self.groups.len() == before {
            return Err(AppError::not_found(format!("group {}", id)));
        }

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.urls)
            .into_iter()
            .partition(|entry| entry.group_id == id);
        self.urls = kept;
        Ok(removed)
    }

    pub fn add_url(&mut self, group_id: Uuid, url: &str, target_price: Option<f64>) -> Result<UrlEntry> {
        if self.group(group_id).is_none() {
            return Err(AppError::not_found(format!("group {}", group_id)));
        }

        let entry = UrlEntry::new(NewUrlEntry {
            group_id,
            url: url.trim().to_string(),
            target_price,
        })?;
        if self.is_tracked(group_id, &entry.url, None) {
            return Err(AppError::DuplicateEntry {
                group_id,
                url: entry.url,
            });
        }

        self.urls.push(entry.clone());
        Ok(entry)
    }

    /// Points an entry at a new URL. Price and history are kept.
    pub fn update_url(&mut self, id: Uuid, url: &str) -> Result<UrlEntry> {
        let normalized = normalize_url(url)?;
        let group_id = self
            .entry(id)
            .map(|entry| entry.group_id)
            .ok_or_else(|| AppError::not_found(format!("url entry {}", id)))?;

        if self.is_tracked(group_id, &normalized, Some(id)) {
            return Err(AppError::DuplicateEntry {
                group_id,
                url: normalized,
            });
        }

        let entry = self
            .entry_mut(id)
            .ok_or_else(|| AppError::not_found(format!("url entry {}", id)))?;
        entry.url = normalized;
        Ok(entry.clone())
    }

    pub fn set_target_price(&mut self, id: Uuid, target_price: Option<f64>) -> Result<UrlEntry> {
        validate_target_price(target_price)?;
        let entry = self
            .entry_mut(id)
            .ok_or_else(|| AppError::not_found(format!("url entry {}", id)))?;
        entry.target_price = target_price;
        Ok(entry.clone())
    }

    pub fn delete_url(&mut self, id: Uuid) -> Result<UrlEntry> {
        let index = self
            .urls
            .iter()
            .position(|entry| entry.id == id)
            .ok_or_else(|| AppError::not_found(format!("url entry {}", id)))?;
        Ok(self.urls.remove(index))
    }

    /// Checks the invariants a loaded store must satisfy.
    pub fn check_consistency(&self) -> std::result::Result<(), Inconsistency> {
        let mut group_ids = HashSet::new();
        for group in &self.groups {
            if !group_ids.insert(group.id) {
                return Err(Inconsistency::groups(format!("duplicate group id {}", group.id)));
            }
        }

        let mut entry_ids = HashSet::new();
        let mut tracked = HashSet::new();
        for entry in &self.urls {
            if !entry_ids.insert(entry.id) {
                return Err(Inconsistency::urls(format!("duplicate entry id {}", entry.id)));
            }
            if !group_ids.contains(&entry.group_id) {
                return Err(Inconsistency::urls(format!(
                    "entry {} references unknown group {}",
                    entry.id, entry.group_id
                )));
            }
            if !tracked.insert((entry.group_id, entry.url.as_str())) {
                return Err(Inconsistency::urls(format!(
                    "{} is tracked twice in group {}",
                    entry.url, entry.group_id
                )));
            }
            if let Some(index) = first_out_of_order(&entry.history) {
                return Err(Inconsistency::urls(format!(
                    "history of entry {} goes back in time at point {}",
                    entry.id, index
                )));
            }
            if let Some(last) = entry.history.last() {
                let matches_last = entry
                    .current_price
                    .is_some_and(|current| same_price(current, last.price));
                if !matches_last {
                    return Err(Inconsistency::urls(format!(
                        "entry {} has current price {:?} but last recorded price {}",
                        entry.id, entry.current_price, last.price
                    )));
                }
            }
        }
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extraction::{ExtractionFailure, FailureKind};

/// One URL that could not be updated in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFailure {
    pub group_id: Uuid,
    pub group_name: String,
    pub entry_id: Uuid,
    pub url: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl UpdateFailure {
    pub fn new(group_id: Uuid, group_name: &str, entry_id: Uuid, url: &str, failure: ExtractionFailure) -> Self {
        Self {
            group_id,
            group_name: group_name.to_string(),
            entry_id,
            url: url.to_string(),
            kind: failure.kind,
            detail: failure.detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed_count: usize,
    pub succeeded_count: usize,
    /// Entries whose history gained a point in this run.
    pub changed_count: usize,
    /// Entries at or below their target price after the run.
    pub on_target: Vec<Uuid>,
    pub failures: Vec<UpdateFailure>,
}

impl UpdateReport {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            processed_count: 0,
            succeeded_count: 0,
            changed_count: 0,
            on_target: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.processed_count > 0 && self.failures.len() >= self.processed_count
    }
}

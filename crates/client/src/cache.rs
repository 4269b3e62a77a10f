//! Task status cache.
//!
//! Single source of truth for "latest known status of task X". Records
//! are replaced wholesale on every accepted update. Push events and
//! poll responses both write here with no ordering guarantee between
//! them, so each write carries the server timestamp it observed: a
//! write strictly older than the stored record is rejected as stale
//! rather than allowed to regress a status that already advanced.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Duration;

use linework_core::status::JobState;
use linework_core::task::TaskStatus;
use linework_core::types::{TaskId, Timestamp};

/// Result of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for this task.
    Inserted,
    /// The record was replaced; `previous` is the state it had before.
    Updated { previous: JobState },
    /// The write observed an older server timestamp than the stored
    /// record and was dropped.
    Stale,
}

/// Map of task id → last-known status record.
#[derive(Default)]
pub struct StatusCache {
    entries: RwLock<HashMap<TaskId, TaskStatus>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `status.id`.
    ///
    /// Records without `updated_at` are optimistic placeholders stamped
    /// with the client clock; they never replace a server-stamped
    /// record, and client and server clocks are never compared. Between
    /// two server-stamped records, writes carrying the same timestamp as
    /// the stored one win (last-write-wins); only strictly older writes
    /// are rejected.
    pub fn upsert(&self, status: TaskStatus) -> UpsertOutcome {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        match entries.get_mut(&status.id) {
            Some(existing) => {
                let stale = match (status.updated_at, existing.updated_at) {
                    // Placeholder over placeholder: refresh is fine.
                    (None, None) => false,
                    // A placeholder never regresses a server-stamped record.
                    (None, Some(_)) => true,
                    // A server-stamped record always beats the placeholder.
                    (Some(_), None) => false,
                    (Some(incoming), Some(stored)) => incoming < stored,
                };
                if stale {
                    tracing::debug!(
                        task_id = %status.id,
                        "Dropping stale status update",
                    );
                    return UpsertOutcome::Stale;
                }
                let previous = JobState::from(existing.status);
                *existing = status;
                UpsertOutcome::Updated { previous }
            }
            None => {
                entries.insert(status.id.clone(), status);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Last-known record for a task, if any.
    pub fn get(&self, task_id: &str) -> Option<TaskStatus> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(task_id)
            .cloned()
    }

    /// All records, most recently created first.
    pub fn all(&self) -> Vec<TaskStatus> {
        let mut records: Vec<TaskStatus> = self
            .entries
            .read()
            .expect("cache lock poisoned")
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop terminal entries whose last update is older than `grace`
    /// before `now`. Returns how many entries were removed.
    ///
    /// Without this the map grows without bound in long-lived sessions;
    /// in-flight entries are never removed.
    pub fn prune_terminal(&self, grace: Duration, now: Timestamp) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, record| {
            !record.status.is_terminal() || record.observed_at() + grace > now
        });
        before - entries.len()
    }
}

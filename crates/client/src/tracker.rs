//! Job tracker composing the REST client, the status cache, and the
//! realtime channel.
//!
//! Submitting a job inserts a pending cache entry immediately; push
//! events and poll responses then advance it. Every first transition
//! into `Completed` triggers exactly one refresh of the authoritative
//! sketch list, so server state wins over the optimistic local view.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use linework_core::sketch::Sketch;
use linework_core::status::{JobState, TaskState};
use linework_core::task::TaskStatus;
use linework_core::types::SketchId;

use crate::cache::{StatusCache, UpsertOutcome};
use crate::channel::{RealtimeChannel, Subscription};
use crate::events::TrackerEvent;
use crate::messages::TaskUpdate;
use crate::poll::{self, PollConfig, PollError};
use crate::rest::{
    CreateSketchRequest, CreateSketchResponse, DeleteSketchResponse, ListSketchesParams,
    RestClient, RestError,
};

/// Broadcast channel capacity for tracker events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Page size used when refreshing the sketch list.
const LIST_REFRESH_LIMIT: u32 = 50;

/// How long terminal cache entries are kept after their last update.
const PRUNE_GRACE_SECS: i64 = 300;

struct TrackerInner {
    rest: RestClient,
    cache: StatusCache,
    sketches: RwLock<Vec<Sketch>>,
    event_tx: broadcast::Sender<TrackerEvent>,
}

/// Client-side view of the caller's sketch jobs.
///
/// Cheap to clone; clones share the cache, the sketch list, and the
/// event channel.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl JobTracker {
    pub fn new(rest: RestClient) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(TrackerInner {
                rest,
                cache: StatusCache::new(),
                sketches: RwLock::new(Vec::new()),
                event_tx,
            }),
        }
    }

    /// Subscribe to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Route the channel's `task_update` events into this tracker.
    ///
    /// Returns the channel subscription; dropping the tracker while the
    /// subscription is live is safe, updates just stop being recorded.
    pub fn attach(&self, channel: &RealtimeChannel) -> Subscription {
        let inner = Arc::clone(&self.inner);
        channel.subscribe_task_updates(move |update| {
            apply_status(&inner, status_from_update(&inner, update));
        })
    }

    /// Submit a sketch job and start tracking its task.
    ///
    /// The cache gains a `pending` entry before the server has pushed
    /// anything. The sketch list is refreshed afterwards so the new
    /// record shows up; a refresh failure is logged, not returned, since
    /// the job itself was created.
    pub async fn create_sketch(
        &self,
        request: &CreateSketchRequest,
    ) -> Result<CreateSketchResponse, RestError> {
        let response = self.inner.rest.create_sketch(request).await?;

        self.inner.cache.upsert(TaskStatus {
            id: response.task_id.clone(),
            status: TaskState::Pending,
            created_at: Utc::now(),
            updated_at: None,
            function: Some("process_sketch_background".to_string()),
            error: None,
            result: None,
        });
        let _ = self.inner.event_tx.send(TrackerEvent::JobSubmitted {
            sketch_id: response.sketch_id,
            task_id: response.task_id.clone(),
        });
        tracing::info!(
            sketch_id = response.sketch_id,
            task_id = %response.task_id,
            "Sketch job created",
        );

        if let Err(e) = self.refresh_sketches().await {
            tracing::warn!(error = %e, "Failed to refresh sketch list after create");
        }

        Ok(response)
    }

    /// Re-fetch the authoritative sketch list from the server.
    ///
    /// Also prunes terminal cache entries past their grace period.
    pub async fn refresh_sketches(&self) -> Result<Vec<Sketch>, RestError> {
        self.inner.refresh().await
    }

    /// Last-fetched sketch list.
    pub fn sketches(&self) -> Vec<Sketch> {
        self.inner
            .sketches
            .read()
            .expect("sketch list lock poisoned")
            .clone()
    }

    /// Fetch one sketch record, updating the local list in place.
    pub async fn sketch(&self, sketch_id: SketchId) -> Result<Sketch, RestError> {
        let sketch = self.inner.rest.sketch(sketch_id).await?;

        let mut sketches = self
            .inner
            .sketches
            .write()
            .expect("sketch list lock poisoned");
        if let Some(existing) = sketches.iter_mut().find(|s| s.id == sketch_id) {
            *existing = sketch.clone();
        }

        Ok(sketch)
    }

    /// Delete a sketch on the server and drop it from the local list.
    pub async fn delete_sketch(
        &self,
        sketch_id: SketchId,
    ) -> Result<DeleteSketchResponse, RestError> {
        let response = self.inner.rest.delete_sketch(sketch_id).await?;

        self.inner
            .sketches
            .write()
            .expect("sketch list lock poisoned")
            .retain(|s| s.id != sketch_id);

        Ok(response)
    }

    /// Last-known status of a task, if tracked.
    pub fn task(&self, task_id: &str) -> Option<TaskStatus> {
        self.inner.cache.get(task_id)
    }

    /// All tracked task records, most recently created first.
    pub fn tasks(&self) -> Vec<TaskStatus> {
        self.inner.cache.all()
    }

    /// The underlying status cache.
    pub fn cache(&self) -> &StatusCache {
        &self.inner.cache
    }

    /// Poll a task to a terminal state, feeding every response through
    /// the cache (stale responses are dropped there, so a poll racing a
    /// push cannot regress the recorded status).
    pub async fn poll_until_terminal(
        &self,
        task_id: &str,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<TaskStatus, PollError> {
        let inner = Arc::clone(&self.inner);
        poll::poll_task(&self.inner.rest, task_id, config, cancel, move |status| {
            apply_status(&inner, status.clone());
        })
        .await
    }
}

impl TrackerInner {
    async fn refresh(self: &Arc<Self>) -> Result<Vec<Sketch>, RestError> {
        let params = ListSketchesParams {
            skip: Some(0),
            limit: Some(LIST_REFRESH_LIMIT),
            status_filter: None,
        };
        let sketches = self.rest.list_sketches(&params).await?;

        *self
            .sketches
            .write()
            .expect("sketch list lock poisoned") = sketches.clone();
        let _ = self.event_tx.send(TrackerEvent::SketchListRefreshed {
            count: sketches.len(),
        });

        let removed = self
            .cache
            .prune_terminal(chrono::Duration::seconds(PRUNE_GRACE_SECS), Utc::now());
        if removed > 0 {
            tracing::debug!(removed, "Pruned terminal task entries");
        }

        Ok(sketches)
    }
}

/// Build a cache record from a push event, preserving the original
/// creation time when the task is already tracked.
fn status_from_update(inner: &Arc<TrackerInner>, update: TaskUpdate) -> TaskStatus {
    let existing = inner.cache.get(&update.task_id);
    let created_at = existing
        .as_ref()
        .map(|record| record.created_at)
        .unwrap_or(update.timestamp);
    let function = existing.and_then(|record| record.function);

    TaskStatus {
        id: update.task_id,
        status: update.status,
        created_at,
        updated_at: Some(update.timestamp),
        function,
        error: update.error,
        result: update.result,
    }
}

/// Record a status observation and emit the matching events.
///
/// Both push and poll paths funnel through here, so the
/// completion-triggered list refresh fires exactly once per task no
/// matter which path delivered the terminal state first.
fn apply_status(inner: &Arc<TrackerInner>, status: TaskStatus) {
    let task_id = status.id.clone();
    let state = JobState::from(status.status);
    let error = status.error.clone();

    let outcome = inner.cache.upsert(status);
    if outcome == UpsertOutcome::Stale {
        return;
    }

    let _ = inner.event_tx.send(TrackerEvent::TaskUpdated {
        task_id: task_id.clone(),
        state,
    });

    if entered_state(outcome, state, JobState::Completed) {
        tracing::info!(task_id = %task_id, "Sketch processing completed");
        let _ = inner.event_tx.send(TrackerEvent::JobCompleted {
            task_id: task_id.clone(),
        });

        // Server state takes precedence over the optimistic cache entry.
        let refresh_inner = Arc::clone(inner);
        tokio::spawn(async move {
            if let Err(e) = refresh_inner.refresh().await {
                tracing::warn!(error = %e, "Failed to refresh sketch list after completion");
            }
        });
    } else if entered_state(outcome, state, JobState::Failed) {
        tracing::warn!(task_id = %task_id, error = ?error, "Sketch processing failed");
        let _ = inner
            .event_tx
            .send(TrackerEvent::JobFailed { task_id, error });
    }
}

/// True when this write moved the task into `target` for the first time.
fn entered_state(outcome: UpsertOutcome, new_state: JobState, target: JobState) -> bool {
    new_state == target
        && match outcome {
            UpsertOutcome::Inserted => true,
            UpsertOutcome::Updated { previous } => previous != target,
            UpsertOutcome::Stale => false,
        }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entered_state_fires_once_per_transition() {
        assert!(entered_state(
            UpsertOutcome::Inserted,
            JobState::Completed,
            JobState::Completed
        ));
        assert!(entered_state(
            UpsertOutcome::Updated {
                previous: JobState::Running
            },
            JobState::Completed,
            JobState::Completed
        ));
        // Re-delivery of an already-recorded terminal state.
        assert!(!entered_state(
            UpsertOutcome::Updated {
                previous: JobState::Completed
            },
            JobState::Completed,
            JobState::Completed
        ));
        assert!(!entered_state(
            UpsertOutcome::Stale,
            JobState::Completed,
            JobState::Completed
        ));
        assert!(!entered_state(
            UpsertOutcome::Inserted,
            JobState::Failed,
            JobState::Completed
        ));
    }
}

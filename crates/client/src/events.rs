//! High-level events emitted by the job tracker.
//!
//! These describe state changes consumers care about, after the raw
//! push/poll traffic has been interpreted. Delivered via a
//! `tokio::sync::broadcast` channel; see
//! [`JobTracker::subscribe`](crate::tracker::JobTracker::subscribe).

use serde::Serialize;

use linework_core::status::JobState;
use linework_core::types::{SketchId, TaskId};

/// A state change observed by the tracker.
#[derive(Debug, Clone, Serialize)]
pub enum TrackerEvent {
    /// A sketch job was submitted and is pending on the server.
    JobSubmitted {
        sketch_id: SketchId,
        task_id: TaskId,
    },

    /// The status cache accepted an update for a task.
    TaskUpdated { task_id: TaskId, state: JobState },

    /// A task transitioned into `Completed` for the first time.
    JobCompleted { task_id: TaskId },

    /// A task transitioned into `Failed`.
    JobFailed {
        task_id: TaskId,
        error: Option<String>,
    },

    /// The authoritative sketch list was re-fetched from the server.
    SketchListRefreshed { count: usize },
}

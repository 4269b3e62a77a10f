//! Job status enumerations.
//!
//! The sketch API exposes two near-duplicate status sets on the wire:
//! the sketch record carries `pending | processing | completed | failed`
//! and the background task record carries `pending | running | completed
//! | failed | timeout`. Both are kept verbatim as [`SketchStatus`] and
//! [`TaskState`] so serialization matches the server exactly; everything
//! internal works on the unified [`JobState`], with explicit conversions
//! instead of guessed equivalences.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a sketch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SketchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Lifecycle status of a background task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl TaskState {
    /// True once no further transition can occur.
    pub fn is_terminal(self) -> bool {
        JobState::from(self).is_terminal()
    }
}

/// Unified job lifecycle used by the status cache and tracker.
///
/// Both wire enums map into this one; `processing` and `running` are
/// the same phase seen from the two record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    /// True once no further transition can occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

impl From<SketchStatus> for JobState {
    fn from(value: SketchStatus) -> Self {
        match value {
            SketchStatus::Pending => Self::Queued,
            SketchStatus::Processing => Self::Running,
            SketchStatus::Completed => Self::Completed,
            SketchStatus::Failed => Self::Failed,
        }
    }
}

impl From<TaskState> for JobState {
    fn from(value: TaskState) -> Self {
        match value {
            TaskState::Pending => Self::Queued,
            TaskState::Running => Self::Running,
            TaskState::Completed => Self::Completed,
            TaskState::Failed => Self::Failed,
            TaskState::Timeout => Self::TimedOut,
        }
    }
}

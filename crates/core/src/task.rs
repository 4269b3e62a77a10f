//! Background task status record.
//!
//! This is the record the status cache owns: one entry per submitted
//! job, replaced wholesale on every update. The same shape arrives via
//! `GET /sketch/task/{id}` and (minus `function`) via realtime
//! `task_update` events.

use serde::{Deserialize, Serialize};

use crate::status::TaskState;
use crate::types::{TaskId, Timestamp};

/// Last-known status of one background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: TaskId,
    pub status: TaskState,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    /// Name of the server-side function executing the task.
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl TaskStatus {
    /// Most recent point in time this record reflects.
    pub fn observed_at(&self) -> Timestamp {
        self.updated_at.unwrap_or(self.created_at)
    }
}

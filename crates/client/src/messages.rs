//! Realtime message envelope and payload types.
//!
//! The server pushes JSON messages of the shape `{"type": "<name>",
//! "data": {...}}` over the WebSocket. The envelope is parsed first so
//! the channel can route by type name; payloads are decoded by the
//! typed subscription helpers.

use serde::Deserialize;

use linework_core::status::TaskState;
use linework_core::types::{TaskId, Timestamp};

/// Event type name for task status transitions.
pub const TASK_UPDATE: &str = "task_update";

/// Tagged envelope wrapping every realtime message.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Payload of a `task_update` message.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    pub status: TaskState,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Parse a raw text frame into an [`Envelope`].
///
/// Returns `Err` for malformed JSON or a missing `type`/`data` field.
/// Callers log the error and drop the frame; a bad message is never
/// fatal to the connection.
pub fn parse_envelope(text: &str) -> Result<Envelope, serde_json::Error> {
    serde_json::from_str(text)
}

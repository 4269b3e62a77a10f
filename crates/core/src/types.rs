/// Sketch records are keyed by a server-assigned integer id.
pub type SketchId = i64;

/// Background tasks are keyed by an opaque server-assigned string.
pub type TaskId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

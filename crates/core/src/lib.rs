//! Shared types for the Linework sketch client.
//!
//! Identifier and timestamp aliases, the wire status enumerations used
//! by the sketch API, the unified [`status::JobState`] lifecycle, and
//! the sketch/task record shapes exchanged with the server.

pub mod sketch;
pub mod status;
pub mod task;
pub mod types;

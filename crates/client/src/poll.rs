//! Polling fallback for task status.
//!
//! Used when push delivery is not connected or not trusted: query
//! `GET /sketch/task/{id}` at a fixed cadence until the task reaches a
//! terminal state, the attempt budget runs out, or the caller cancels.
//! Attempts are strictly serialized; the next query is scheduled only
//! after the previous response has been handled.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use linework_core::task::TaskStatus;

use crate::rest::{RestClient, RestError};

/// Cadence and budget of the polling loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Queries made before giving up.
    pub max_attempts: u32,
    /// Wait between consecutive queries.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_millis(2000),
        }
    }
}

/// Errors terminating the polling loop.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A status query failed; the loop aborts rather than retrying.
    #[error(transparent)]
    Rest(#[from] RestError),

    /// The task did not reach a terminal state within the budget.
    #[error("task did not complete within {attempts} status queries")]
    Timeout { attempts: u32 },

    /// The caller cancelled the loop between attempts.
    #[error("polling cancelled")]
    Cancelled,
}

/// Poll a task until it reaches a terminal state.
///
/// `on_update` sees every fetched record, including the terminal one.
/// Transport and API errors abort immediately and surface to the
/// caller; only the fixed attempt budget bounds retries.
pub async fn poll_task(
    rest: &RestClient,
    task_id: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_update: impl FnMut(&TaskStatus),
) -> Result<TaskStatus, PollError> {
    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        let status = rest.task_status(task_id).await?;
        on_update(&status);

        if status.status.is_terminal() {
            tracing::debug!(
                task_id,
                attempt,
                status = ?status.status,
                "Task reached terminal state",
            );
            return Ok(status);
        }

        if attempt == config.max_attempts {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    tracing::warn!(
        task_id,
        attempts = config.max_attempts,
        "Polling budget exhausted",
    );
    Err(PollError::Timeout {
        attempts: config.max_attempts,
    })
}

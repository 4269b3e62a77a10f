//! Client configuration loaded from environment variables.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::poll::PollConfig;

/// Connection endpoints and retry tuning.
///
/// All fields have defaults suitable for a local development server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP API base URL (default: `http://localhost:8000`).
    pub api_url: String,
    /// WebSocket base URL (default: `ws://localhost:8000`).
    pub ws_url: String,
    /// Bearer token for API calls and the realtime handshake.
    pub auth_token: Option<String>,
    /// Reconnect schedule for the realtime channel.
    pub reconnect: ReconnectPolicy,
    /// Cadence and budget of the polling fallback.
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000".to_string(),
            auth_token: None,
            reconnect: ReconnectPolicy::default(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `API_URL`                  | `http://localhost:8000`  |
    /// | `WS_URL`                   | `ws://localhost:8000`    |
    /// | `AUTH_TOKEN`               | unset                    |
    /// | `WS_RECONNECT_BASE_MS`     | `1000`                   |
    /// | `WS_RECONNECT_MAX_ATTEMPTS`| `5`                      |
    /// | `POLL_INTERVAL_MS`         | `2000`                   |
    /// | `POLL_MAX_ATTEMPTS`        | `60`                     |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("API_URL").unwrap_or(defaults.api_url);
        let ws_url = std::env::var("WS_URL").unwrap_or(defaults.ws_url);
        let auth_token = std::env::var("AUTH_TOKEN").ok();

        let base_ms: u64 = std::env::var("WS_RECONNECT_BASE_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WS_RECONNECT_BASE_MS must be a valid u64");
        let max_attempts: u32 = std::env::var("WS_RECONNECT_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("WS_RECONNECT_MAX_ATTEMPTS must be a valid u32");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");
        let poll_max_attempts: u32 = std::env::var("POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("POLL_MAX_ATTEMPTS must be a valid u32");

        Self {
            api_url,
            ws_url,
            auth_token,
            reconnect: ReconnectPolicy {
                base_interval: Duration::from_millis(base_ms),
                max_attempts,
            },
            poll: PollConfig {
                max_attempts: poll_max_attempts,
                interval: Duration::from_millis(poll_interval_ms),
            },
        }
    }
}

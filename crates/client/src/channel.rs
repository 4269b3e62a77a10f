//! Realtime update channel.
//!
//! [`RealtimeChannel`] maintains at most one live connection to the
//! server's event endpoint, routes `{type, data}` envelopes to
//! registered subscribers, and recovers from unannounced disconnects
//! with an exponential-backoff schedule (see
//! [`ReconnectPolicy`](crate::backoff::ReconnectPolicy)).
//!
//! The channel is constructed with a [`Connector`] so callers own the
//! instance and tests can substitute an in-memory transport; there is
//! no process-global singleton.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backoff::ReconnectPolicy;
use crate::messages::{self, TaskUpdate};
use crate::transport::{Connector, Transport, TransportError};

/// Connection lifecycle of the channel.
///
/// `Reconnecting` is entered only after an unclean closure; an explicit
/// [`RealtimeChannel::disconnect`] goes straight to `Disconnected` and
/// suppresses recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the backoff delay before reconnect attempt `attempt`.
    Reconnecting { attempt: u32 },
}

/// Errors surfaced by [`RealtimeChannel::connect`].
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("connection failed: {0}")]
    Connect(#[from] TransportError),

    /// A connection attempt this call was waiting on failed.
    #[error("concurrent connection attempt failed")]
    AttemptFailed,
}

type Handler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Event-type → ordered handler list.
///
/// Handlers are invoked synchronously in registration order; a handler
/// that panics is logged and skipped without affecting the rest.
#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(u64, Handler)>>>,
}

impl Registry {
    fn add(&self, event_type: &str, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("registry lock poisoned")
            .entry(event_type.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn remove(&self, event_type: &str, id: u64) {
        let mut handlers = self.handlers.lock().expect("registry lock poisoned");
        if let Some(entries) = handlers.get_mut(event_type) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                handlers.remove(event_type);
            }
        }
    }

    fn clear(&self) {
        self.handlers
            .lock()
            .expect("registry lock poisoned")
            .clear();
    }

    fn dispatch(&self, event_type: &str, data: &serde_json::Value) {
        // Clone the handler list so the lock is not held across callbacks.
        let entries: Vec<(u64, Handler)> = self
            .handlers
            .lock()
            .expect("registry lock poisoned")
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        for (id, handler) in entries {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(data.clone())));
            if result.is_err() {
                tracing::error!(event_type, handler_id = id, "Event handler panicked");
            }
        }
    }
}

/// Capability returned by [`RealtimeChannel::subscribe`].
///
/// Removes exactly the handler it was created for; invoking it a second
/// time is a no-op. Dropping the capability without calling
/// [`unsubscribe`](Self::unsubscribe) leaves the handler registered
/// until the channel is disconnected.
pub struct Subscription {
    registry: Arc<Registry>,
    event_type: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the handler from the registry.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.registry.remove(&self.event_type, self.id);
        }
    }
}

struct Session {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

struct Inner {
    connector: Box<dyn Connector>,
    policy: ReconnectPolicy,
    registry: Arc<Registry>,
    state_tx: watch::Sender<ChannelState>,
    /// Serializes connection attempts started via `connect`.
    connect_gate: tokio::sync::Mutex<()>,
    session: Mutex<Option<Session>>,
    /// Credential kept for automatic reconnects.
    token: Mutex<Option<String>>,
}

/// Persistent realtime connection with automatic recovery.
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

impl RealtimeChannel {
    /// Create a channel over the given connector. No connection is made
    /// until [`connect`](Self::connect) is called.
    pub fn new(connector: impl Connector + 'static, policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                connector: Box::new(connector),
                policy,
                registry: Arc::new(Registry::default()),
                state_tx,
                connect_gate: tokio::sync::Mutex::new(()),
                session: Mutex::new(None),
                token: Mutex::new(None),
            }),
        }
    }

    /// Establish the connection, authenticating with `token`.
    ///
    /// Idempotent: when already connected this resolves immediately, and
    /// when an attempt is already in flight this waits for it to settle
    /// instead of opening a second connection.
    pub async fn connect(&self, token: &str) -> Result<(), ChannelError> {
        let mut rx = self.inner.state_tx.subscribe();
        let mut waited = false;
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ChannelState::Connected => return Ok(()),
                ChannelState::Connecting | ChannelState::Reconnecting { .. } => {
                    waited = true;
                    if rx.changed().await.is_err() {
                        return Err(ChannelError::AttemptFailed);
                    }
                }
                ChannelState::Disconnected if waited => return Err(ChannelError::AttemptFailed),
                ChannelState::Disconnected => break,
            }
        }

        let _gate = self.inner.connect_gate.lock().await;
        if *self.inner.state_tx.borrow() == ChannelState::Connected {
            return Ok(());
        }

        *self.inner.token.lock().expect("token lock poisoned") = Some(token.to_string());
        self.inner.state_tx.send_replace(ChannelState::Connecting);

        match self.inner.connector.connect(token).await {
            Ok(transport) => {
                self.install_session(transport);
                Ok(())
            }
            Err(e) => {
                self.inner.state_tx.send_replace(ChannelState::Disconnected);
                Err(e.into())
            }
        }
    }

    /// Close the connection intentionally.
    ///
    /// Cancels any pending reconnect schedule, clears all subscriptions,
    /// and leaves the channel `Disconnected` until the next `connect`.
    pub async fn disconnect(&self) {
        let session = self
            .inner
            .session
            .lock()
            .expect("session lock poisoned")
            .take();
        if let Some(session) = session {
            session.cancel.cancel();
            let _ =
                tokio::time::timeout(std::time::Duration::from_secs(5), session.handle).await;
        }
        self.inner
            .token
            .lock()
            .expect("token lock poisoned")
            .take();
        self.inner.registry.clear();
        self.inner.state_tx.send_replace(ChannelState::Disconnected);
    }

    /// Register a handler for a named event type.
    ///
    /// The handler receives the raw `data` payload of matching
    /// envelopes. Returns a capability that removes exactly this
    /// handler.
    pub fn subscribe<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        let id = self.inner.registry.add(event_type, Arc::new(handler));
        Subscription {
            registry: Arc::clone(&self.inner.registry),
            event_type: event_type.to_string(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Register a typed handler for `task_update` events.
    ///
    /// Payloads that fail to decode are logged and dropped.
    pub fn subscribe_task_updates<F>(&self, handler: F) -> Subscription
    where
        F: Fn(TaskUpdate) + Send + Sync + 'static,
    {
        self.subscribe(messages::TASK_UPDATE, move |data| {
            match serde_json::from_value::<TaskUpdate>(data) {
                Ok(update) => handler(update),
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed task_update payload");
                }
            }
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// True while the connection is live.
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    fn install_session(&self, transport: Box<dyn Transport>) {
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_session(inner, transport, task_cancel).await;
        });

        *self
            .inner
            .session
            .lock()
            .expect("session lock poisoned") = Some(Session { cancel, handle });
        self.inner.state_tx.send_replace(ChannelState::Connected);
    }
}

/// Session driver: read frames until closure, then recover or exit.
///
/// Each successful (re)connection starts a fresh backoff sequence, so
/// the attempt counter is effectively reset to zero on success.
async fn run_session(
    inner: Arc<Inner>,
    mut transport: Box<dyn Transport>,
    cancel: CancellationToken,
) {
    loop {
        let closed_cleanly = read_until_closed(&inner, transport.as_mut(), &cancel).await;
        if closed_cleanly {
            // disconnect() owns the state transition.
            return;
        }

        match reconnect_with_backoff(&inner, &cancel).await {
            Some(next) => {
                transport = next;
                inner.state_tx.send_replace(ChannelState::Connected);
            }
            None => return,
        }
    }
}

/// Read and dispatch frames. Returns `true` for an intentional close.
async fn read_until_closed(
    inner: &Inner,
    transport: &mut dyn Transport,
    cancel: &CancellationToken,
) -> bool {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                transport.close().await;
                return true;
            }
            frame = transport.next_text() => match frame {
                Some(Ok(text)) => dispatch_frame(&inner.registry, &text),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Realtime receive error");
                    return false;
                }
                None => {
                    tracing::info!("Realtime connection lost");
                    return false;
                }
            }
        }
    }
}

/// Parse one frame and fan it out. Malformed frames are dropped.
fn dispatch_frame(registry: &Registry, text: &str) {
    match messages::parse_envelope(text) {
        Ok(envelope) => registry.dispatch(&envelope.event_type, &envelope.data),
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to parse realtime message");
        }
    }
}

/// Retry the connection on the backoff schedule.
///
/// Returns the new transport, or `None` once cancelled or the attempt
/// cap is exhausted (in which case the channel parks `Disconnected`).
async fn reconnect_with_backoff(
    inner: &Inner,
    cancel: &CancellationToken,
) -> Option<Box<dyn Transport>> {
    let token = inner
        .token
        .lock()
        .expect("token lock poisoned")
        .clone();
    let Some(token) = token else {
        inner.state_tx.send_replace(ChannelState::Disconnected);
        return None;
    };

    for attempt in 1..=inner.policy.max_attempts {
        inner
            .state_tx
            .send_replace(ChannelState::Reconnecting { attempt });
        let delay = inner.policy.delay_for(attempt);
        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect",
        );

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = inner.connector.connect(&token) => match result {
                Ok(transport) => {
                    tracing::info!(attempt, "Reconnected");
                    return Some(transport);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                }
            }
        }
    }

    tracing::warn!(
        max_attempts = inner.policy.max_attempts,
        "Reconnect attempts exhausted; staying disconnected",
    );
    inner.state_tx.send_replace(ChannelState::Disconnected);
    None
}

//! Shared test doubles: an in-memory realtime transport.
//!
//! The fake connector hands out transports backed by unbounded
//! channels, so tests can push frames, force receive errors, and drop
//! connections to simulate unclean closure, all without sockets.

// Each test binary uses a different subset of this module.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use linework_client::transport::{Connector, Transport, TransportError};

type Frame = Result<String, TransportError>;

/// Observable state shared between the test body and the connector
/// after the connector has been moved into the channel.
#[derive(Default)]
pub struct ConnectorState {
    attempts: AtomicUsize,
    attempt_times: Mutex<Vec<tokio::time::Instant>>,
    tokens: Mutex<Vec<String>>,
    /// Outcomes for upcoming connect calls; empty means "succeed".
    plan: Mutex<VecDeque<bool>>,
    /// Artificial delay applied to every connect call.
    connect_delay: Mutex<Option<Duration>>,
    /// Senders feeding the currently live transports, oldest first.
    conns: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
}

impl ConnectorState {
    /// Total connect calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Virtual instant of each connect call.
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempt_times.lock().unwrap().clone()
    }

    /// Tokens presented to each connect call.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// Queue `n` connect failures before the next success.
    pub fn fail_next(&self, n: usize) {
        let mut plan = self.plan.lock().unwrap();
        for _ in 0..n {
            plan.push_back(false);
        }
    }

    /// Delay every connect call, to keep an attempt observably in flight.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    /// Push a text frame into the most recent connection.
    pub fn push_text(&self, text: &str) {
        let conns = self.conns.lock().unwrap();
        let sender = conns.last().expect("no live connection");
        sender.send(Ok(text.to_string())).expect("transport gone");
    }

    /// Force a receive error on the most recent connection.
    pub fn push_error(&self) {
        let conns = self.conns.lock().unwrap();
        let sender = conns.last().expect("no live connection");
        sender
            .send(Err(TransportError::Receive("forced receive error".into())))
            .expect("transport gone");
    }

    /// Drop the most recent connection, simulating an unclean closure.
    pub fn close_latest(&self) {
        self.conns.lock().unwrap().pop();
    }
}

/// [`Connector`] handing out channel-backed fake transports.
#[derive(Default)]
pub struct FakeConnector {
    state: Arc<ConnectorState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle kept by the test after the connector moves into the channel.
    pub fn state(&self) -> Arc<ConnectorState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, token: &str) -> Result<Box<dyn Transport>, TransportError> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        self.state
            .attempt_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        self.state.tokens.lock().unwrap().push(token.to_string());

        let delay = *self.state.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let succeed = self.state.plan.lock().unwrap().pop_front().unwrap_or(true);
        if !succeed {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.state.conns.lock().unwrap().push(tx);
        Ok(Box::new(FakeTransport { rx }))
    }
}

struct FakeTransport {
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn next_text(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

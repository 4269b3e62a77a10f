//! WebSocket transport abstraction.
//!
//! The realtime channel is written against the [`Connector`] and
//! [`Transport`] traits so tests can drive it with an in-memory fake.
//! [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`, authenticating via a token in the connection
//! URI query string.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Errors from the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Receiving on an established connection failed.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// A live, receive-only view of one realtime connection.
#[async_trait]
pub trait Transport: Send {
    /// Next inbound text frame.
    ///
    /// `Some(Ok(text))` for a frame, `Some(Err(_))` for a receive
    /// failure, `None` once the peer has closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection cleanly. Errors are not interesting to the
    /// caller at this point and are swallowed by implementations.
    async fn close(&mut self);
}

/// Factory for [`Transport`]s; one call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, token: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// Production connector targeting the server's `/ws` endpoint.
pub struct WsConnector {
    ws_url: String,
}

impl WsConnector {
    /// Create a connector for a WebSocket base URL, e.g. `ws://host:8000`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, token: &str) -> Result<Box<dyn Transport>, TransportError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/ws", self.ws_url),
            &[("token", token)],
        )
        .map_err(|e| TransportError::Connect(format!("invalid WebSocket URL: {e}")))?;

        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            TransportError::Connect(format!("failed to connect to {}: {e}", self.ws_url))
        })?;

        tracing::info!("Connected to realtime endpoint at {}", self.ws_url);

        Ok(Box::new(WsTransport { ws_stream }))
    }
}

/// [`Transport`] over a tungstenite WebSocket stream.
struct WsTransport {
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(msg_result) = self.ws_stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Binary(_)) => {
                    tracing::trace!("Ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Realtime connection closed by server");
                    return None;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) {
        let _ = self.ws_stream.close(None).await;
    }
}

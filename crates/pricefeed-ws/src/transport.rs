//! WebSocket transport abstraction
//!
//! This module provides a trait-based abstraction over WebSocket connections,
//! enabling unit testing of the lifecycle manager without real network calls.
//! A [`Connector`] creates one fresh [`Transport`] per connection attempt, so
//! a reconnect always replaces the transport instead of reusing it.
//!
//! # Example
//!
//! ```no_run
//! use pricefeed_ws::transport::{Transport, WsTransport, TransportError};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let mut transport = WsTransport::new("wss://stream.binance.com:9443/ws/btcusdt@trade");
//!     transport.connect().await?;
//!     if let Some(frame) = transport.recv().await? {
//!         println!("Received: {}", frame);
//!     }
//!     transport.close().await
//! }
//! ```

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Whether the connection is unusable after this error
    ///
    /// Protocol errors concern a single frame; the socket itself is still
    /// readable, so they are logged and skipped.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}

/// Trait for WebSocket transport abstraction
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the WebSocket endpoint
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Receive a text frame
    ///
    /// Returns `None` if the connection was closed gracefully.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if currently connected
    fn is_connected(&self) -> bool;

    /// Get the endpoint URL
    fn endpoint(&self) -> &str;
}

/// Factory for per-attempt transports
pub trait Connector: Send + Sync + 'static {
    /// Create an unconnected transport for `url`
    fn transport(&self, url: &str) -> Box<dyn Transport>;
}

/// Real WebSocket transport using tokio-tungstenite
pub struct WsTransport {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a new WebSocket transport
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), TransportError> {
        debug!("Connecting to WebSocket");

        let connect_future = connect_async(&self.url);

        let (ws_stream, _response) = timeout(self.connect_timeout, connect_future)
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(ws_stream);
        debug!("WebSocket connected");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data)
                        .map(Some)
                        .map_err(|e| TransportError::Protocol(e.to_string()));
                }
                Some(Ok(Message::Close(_))) => {
                    self.stream = None;
                    return Ok(None);
                }
                // Pongs are queued by tungstenite and flushed on the next read
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                    continue;
                }
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                None => {
                    self.stream = None;
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Connector producing [`WsTransport`]s
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Create a connector with the given connection timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for WsConnector {
    fn transport(&self, url: &str) -> Box<dyn Transport> {
        Box::new(WsTransport::new(url).with_timeout(self.connect_timeout))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockConnector, MockTransport};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::{Connector, Transport, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Mock transport for testing
    ///
    /// Replays predefined frames. Once the script is exhausted it either
    /// reports the connection as closed or, with `hold_open`, stays silent
    /// until closed.
    pub struct MockTransport {
        url: String,
        connected: bool,
        /// Frames to return on recv()
        pub responses: VecDeque<Result<Option<String>, TransportError>>,
        /// Simulate connection failure
        pub fail_connect: bool,
        /// Keep the connection open once `responses` is drained
        pub hold_open: bool,
        /// Never complete connect()
        pub stall_connect: bool,
    }

    impl MockTransport {
        /// Create a new mock transport
        pub fn new(url: impl Into<String>) -> Self {
            Self {
                url: url.into(),
                connected: false,
                responses: VecDeque::new(),
                fail_connect: false,
                hold_open: false,
                stall_connect: false,
            }
        }

        /// A transport whose connect always fails
        pub fn failing() -> Self {
            Self {
                fail_connect: true,
                ..Self::new("")
            }
        }

        /// A transport whose connect never completes
        pub fn stalled() -> Self {
            Self {
                stall_connect: true,
                ..Self::new("")
            }
        }

        /// Add a frame to be returned on recv()
        pub fn push_response(&mut self, msg: impl Into<String>) {
            self.responses.push_back(Ok(Some(msg.into())));
        }

        /// Add multiple frames
        pub fn push_responses(&mut self, msgs: impl IntoIterator<Item = impl Into<String>>) {
            for msg in msgs {
                self.push_response(msg);
            }
        }

        /// Simulate a clean close
        pub fn push_close(&mut self) {
            self.responses.push_back(Ok(None));
        }

        /// Simulate a receive error
        pub fn push_error(&mut self, error: TransportError) {
            self.responses.push_back(Err(error));
        }

        /// Stay connected after the script is drained
        pub fn held_open(mut self) -> Self {
            self.hold_open = true;
            self
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            if self.stall_connect {
                std::future::pending::<()>().await;
            }
            if self.fail_connect {
                return Err(TransportError::ConnectionFailed("mock connection failure".into()));
            }
            self.connected = true;
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>, TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }
            match self.responses.pop_front() {
                Some(response) => response,
                None if self.hold_open => std::future::pending().await,
                None => Err(TransportError::ConnectionClosed),
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.connected = false;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn endpoint(&self) -> &str {
            &self.url
        }
    }

    #[derive(Default)]
    struct MockState {
        scripts: VecDeque<MockTransport>,
        urls: Vec<String>,
    }

    /// Mock connector handing out scripted transports in order
    ///
    /// When the queue runs dry every further attempt gets a transport whose
    /// connect fails. Clones share the same script queue.
    #[derive(Clone, Default)]
    pub struct MockConnector {
        state: Arc<Mutex<MockState>>,
    }

    impl MockConnector {
        /// Create a connector with an empty script queue
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the transport for the next connection attempt
        pub fn push(&self, transport: MockTransport) {
            self.state.lock().scripts.push_back(transport);
        }

        /// Number of transports handed out so far
        pub fn attempts(&self) -> usize {
            self.state.lock().urls.len()
        }

        /// URLs requested so far, in order
        pub fn urls(&self) -> Vec<String> {
            self.state.lock().urls.clone()
        }
    }

    impl Connector for MockConnector {
        fn transport(&self, url: &str) -> Box<dyn Transport> {
            let mut state = self.state.lock();
            state.urls.push(url.to_string());

            let mut transport = state.scripts.pop_front().unwrap_or_else(MockTransport::failing);
            transport.url = url.to_string();
            Box::new(transport)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_recv() {
        let mut transport = MockTransport::new("wss://mock.test");
        transport.push_response(r#"{"e":"trade"}"#);

        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        let frame = transport.recv().await.unwrap();
        assert!(frame.unwrap().contains("trade"));

        // Script drained without hold_open
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_mock_transport_connection_failure() {
        let mut transport = MockTransport::failing();

        let result = transport.connect().await;
        assert!(result.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_transport_stalled_connect() {
        let mut transport = MockTransport::stalled();

        let result = tokio::time::timeout(Duration::from_secs(30), transport.connect()).await;
        assert!(result.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_mock_transport_close() {
        let mut transport = MockTransport::new("wss://mock.test");
        transport.push_close();

        transport.connect().await.unwrap();
        let response = transport.recv().await.unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_mock_connector_hands_out_scripts_in_order() {
        let connector = MockConnector::new();
        let mut first = MockTransport::new("");
        first.push_response("one");
        connector.push(first);

        let mut t1 = connector.transport("wss://a");
        t1.connect().await.unwrap();
        assert_eq!(t1.endpoint(), "wss://a");
        assert_eq!(t1.recv().await.unwrap().as_deref(), Some("one"));

        let mut t2 = connector.transport("wss://b");
        assert!(t2.connect().await.is_err());

        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.urls(), vec!["wss://a", "wss://b"]);
    }

    #[test]
    fn test_error_fatality() {
        assert!(!TransportError::Protocol("bad utf8".into()).is_fatal());
        assert!(TransportError::ConnectionClosed.is_fatal());
        assert!(TransportError::ReceiveFailed("reset".into()).is_fatal());
    }
}

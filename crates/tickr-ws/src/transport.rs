//! Streaming transport abstraction
//!
//! A [`Connector`] opens a duplex link and hands back a [`TransportHandle`]:
//! a sender half for outbound text and close frames, and a stream of
//! [`TransportEvent`]s. Keeping the halves apart lets the session drive both
//! from one `select!` loop. The stream ending is treated as an abnormal close.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use tickr_ws::transport::{Connector, TransportEvent, TungsteniteConnector};
//!
//! # async fn example() -> Result<(), tickr_ws::transport::TransportError> {
//! let handle = TungsteniteConnector::new()
//!     .connect("wss://stream.tickr.io/v1", &[])
//!     .await?;
//! let mut events = handle.events;
//! while let Some(TransportEvent::Message(text)) = events.next().await {
//!     println!("{}", text);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

/// Close code reported when the link drops without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported for a close frame without a status
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;

/// Transport layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Send failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Connection closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Invalid URL or header
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Something that happened on the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame
    Message(String),
    /// The link closed
    Close { code: u16, reason: String },
    /// The link reported a failure; a close usually follows
    Error(String),
}

/// Outbound half of an open link
#[async_trait]
pub trait TransportSender: Send {
    /// Send a text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a close frame
    async fn close(&mut self, code: u16, reason: String) -> Result<(), TransportError>;
}

/// An open link
pub struct TransportHandle {
    pub sender: Box<dyn TransportSender>,
    pub events: BoxStream<'static, TransportEvent>,
}

/// Capability the streaming session uses to open links
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a link to `url`, sending `headers` with the upgrade request
    async fn connect(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportHandle, TransportError>;
}

// ============================================================================
// tokio-tungstenite
// ============================================================================

/// Default connector backed by `tokio-tungstenite`
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

struct WsSender {
    sink: WsSink,
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: String) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

fn to_event(message: Result<Message, tokio_tungstenite::tungstenite::Error>) -> Option<TransportEvent> {
    match message {
        Ok(Message::Text(text)) => Some(TransportEvent::Message(text)),
        Ok(Message::Binary(data)) => String::from_utf8(data).ok().map(TransportEvent::Message),
        Ok(Message::Close(Some(frame))) => Some(TransportEvent::Close {
            code: u16::from(frame.code),
            reason: frame.reason.into_owned(),
        }),
        Ok(Message::Close(None)) => Some(TransportEvent::Close {
            code: CLOSE_NO_STATUS,
            reason: String::new(),
        }),
        // Control frames are answered by tungstenite itself
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
        Err(e) => Some(TransportEvent::Error(e.to_string())),
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    #[instrument(skip(self, headers))]
    async fn connect(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportHandle, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidRequest(format!("invalid value for {}", name)))?;
            value.set_sensitive(true);
            request.headers_mut().insert(name, value);
        }

        debug!("Connecting to WebSocket");
        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        debug!("WebSocket connected");

        let (sink, stream) = ws_stream.split();
        let events = stream
            .filter_map(|message| futures::future::ready(to_event(message)))
            .boxed();

        Ok(TransportHandle {
            sender: Box::new(WsSender { sink }),
            events,
        })
    }
}

// ============================================================================
// Mock
// ============================================================================

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockConnection, MockConnector};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use futures::channel::mpsc;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct ConnectionShared {
        url: String,
        headers: Vec<(String, String)>,
        events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
        sent: Mutex<Vec<String>>,
        closed: Mutex<Option<(u16, String)>>,
    }

    /// Server side of a mock link
    ///
    /// Inject events with the `push_*` methods; inspect what the client sent
    /// with [`sent`](Self::sent).
    #[derive(Clone)]
    pub struct MockConnection {
        shared: Arc<ConnectionShared>,
    }

    impl MockConnection {
        /// URL the client connected to
        pub fn url(&self) -> &str {
            &self.shared.url
        }

        /// Headers sent with the upgrade request
        pub fn headers(&self) -> &[(String, String)] {
            &self.shared.headers
        }

        fn push(&self, event: TransportEvent) {
            if let Some(tx) = self.shared.events.lock().as_ref() {
                let _ = tx.unbounded_send(event);
            }
        }

        /// Deliver a text frame
        pub fn push_message(&self, text: impl Into<String>) {
            self.push(TransportEvent::Message(text.into()));
        }

        /// Deliver a JSON frame
        pub fn push_json(&self, value: serde_json::Value) {
            self.push_message(value.to_string());
        }

        /// Close the link from the server side
        pub fn push_close(&self, code: u16, reason: impl Into<String>) {
            self.push(TransportEvent::Close {
                code,
                reason: reason.into(),
            });
        }

        /// Report a transport failure
        pub fn push_error(&self, message: impl Into<String>) {
            self.push(TransportEvent::Error(message.into()));
        }

        /// End the event stream without a close frame
        pub fn drop_link(&self) {
            self.shared.events.lock().take();
        }

        /// Text frames sent by the client
        pub fn sent(&self) -> Vec<String> {
            self.shared.sent.lock().clone()
        }

        /// Sent frames parsed as JSON
        pub fn sent_json(&self) -> Vec<serde_json::Value> {
            self.sent()
                .iter()
                .filter_map(|s| serde_json::from_str(s).ok())
                .collect()
        }

        /// Close frame sent by the client, if any
        pub fn closed_by_client(&self) -> Option<(u16, String)> {
            self.shared.closed.lock().clone()
        }
    }

    struct MockSender {
        shared: Arc<ConnectionShared>,
    }

    #[async_trait]
    impl TransportSender for MockSender {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            if self.shared.closed.lock().is_some() {
                return Err(TransportError::ConnectionClosed);
            }
            self.shared.sent.lock().push(text);
            Ok(())
        }

        async fn close(&mut self, code: u16, reason: String) -> Result<(), TransportError> {
            *self.shared.closed.lock() = Some((code, reason.clone()));
            // Echo the close like a real server would
            if let Some(tx) = self.shared.events.lock().take() {
                let _ = tx.unbounded_send(TransportEvent::Close { code, reason });
            }
            Ok(())
        }
    }

    /// Mock connector for testing
    ///
    /// Every successful `connect` creates a new [`MockConnection`].
    #[derive(Default)]
    pub struct MockConnector {
        connections: Mutex<Vec<MockConnection>>,
        attempts: Mutex<u32>,
        fail: Mutex<bool>,
        connect_delay: Mutex<Option<Duration>>,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make subsequent connects fail (or succeed again)
        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        /// Delay every connect, e.g. to trip the connect timeout
        pub fn set_connect_delay(&self, delay: Option<Duration>) {
            *self.connect_delay.lock() = delay;
        }

        /// Number of connect calls, including failed ones
        pub fn connect_count(&self) -> u32 {
            *self.attempts.lock()
        }

        /// Links opened so far
        pub fn connections(&self) -> Vec<MockConnection> {
            self.connections.lock().clone()
        }

        /// Most recently opened link
        pub fn last_connection(&self) -> Option<MockConnection> {
            self.connections.lock().last().cloned()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<TransportHandle, TransportError> {
            *self.attempts.lock() += 1;
            let delay = *self.connect_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if *self.fail.lock() {
                return Err(TransportError::ConnectionFailed("mock connection failure".into()));
            }

            let (tx, rx) = mpsc::unbounded();
            let shared = Arc::new(ConnectionShared {
                url: url.to_string(),
                headers: headers.to_vec(),
                events: Mutex::new(Some(tx)),
                ..Default::default()
            });
            self.connections.lock().push(MockConnection {
                shared: shared.clone(),
            });

            Ok(TransportHandle {
                sender: Box::new(MockSender { shared }),
                events: rx.boxed(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_mapping() {
        assert_eq!(
            to_event(Ok(Message::Text("{}".into()))),
            Some(TransportEvent::Message("{}".into()))
        );
        assert_eq!(to_event(Ok(Message::Ping(vec![1]))), None);
        assert_eq!(
            to_event(Ok(Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "bye".into(),
            })))),
            Some(TransportEvent::Close {
                code: 1001,
                reason: "bye".into()
            })
        );
        assert_eq!(
            to_event(Ok(Message::Close(None))),
            Some(TransportEvent::Close {
                code: CLOSE_NO_STATUS,
                reason: String::new()
            })
        );
    }

    #[tokio::test]
    async fn test_mock_connection_send_recv() {
        let connector = MockConnector::new();
        let mut handle = connector
            .connect("wss://mock.test", &[("Authorization".into(), "Bearer k".into())])
            .await
            .unwrap();
        let conn = connector.last_connection().unwrap();
        assert_eq!(conn.headers()[0].1, "Bearer k");

        conn.push_message(r#"{"type":"pong"}"#);
        assert_eq!(
            handle.events.next().await,
            Some(TransportEvent::Message(r#"{"type":"pong"}"#.into()))
        );

        handle.sender.send_text(r#"{"type":"ping"}"#.into()).await.unwrap();
        assert_eq!(conn.sent(), vec![r#"{"type":"ping"}"#.to_string()]);

        handle.sender.close(1000, "done".into()).await.unwrap();
        assert_eq!(conn.closed_by_client(), Some((1000, "done".into())));
        assert!(matches!(
            handle.events.next().await,
            Some(TransportEvent::Close { code: 1000, .. })
        ));
        assert_eq!(handle.events.next().await, None);
    }

    #[tokio::test]
    async fn test_mock_connection_failure() {
        let connector = MockConnector::new();
        connector.set_fail(true);
        assert!(connector.connect("wss://mock.test", &[]).await.is_err());
        assert_eq!(connector.connect_count(), 1);
        assert!(connector.connections().is_empty());
    }
}

//! Streaming client for Tickr live ticker channels
//!
//! This crate provides a long-lived session over the Tickr streaming API.
//!
//! # Features
//!
//! - Handshake-gated connection state
//! - Automatic reconnection with exponential backoff and jitter
//! - Subscription tracking with restoration after reconnect
//! - Application-level heartbeat
//! - Listener callbacks and async event channels
//!
//! # Example
//!
//! ```no_run
//! use tickr_types::{exchange_ticker_channel, ApiKey};
//! use tickr_ws::{SessionEvent, StreamingConfig, StreamingSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = StreamingSession::new(StreamingConfig::new(ApiKey::new("sk_live_...")));
//!     let mut events = session.events();
//!
//!     session.subscribe([exchange_ticker_channel("kraken")]);
//!     session.connect()?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let SessionEvent::Ticker(update) = event {
//!             println!("{} {:?}", update.symbol, update.data.last);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod events;
pub mod reconnect;
pub mod session;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use events::{EventKind, EventRegistry, ListenerId, ServerInfo, SessionError, SessionEvent};
pub use reconnect::ReconnectConfig;
pub use session::{
    SessionState, StreamingConfig, StreamingSession, DEFAULT_STREAM_URL, STREAM_URL_ENV,
};
pub use subscription::SubscriptionTracker;
pub use transport::{
    Connector, TransportError, TransportEvent, TransportHandle, TransportSender,
    TungsteniteConnector,
};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockConnection, MockConnector};

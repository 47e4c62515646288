//! High-level SDK for the Tickr cryptocurrency pricing API
//!
//! This crate ties the REST pipeline and the streaming session together
//! behind one client that shares a single credential and configuration.
//!
//! # Quick Start
//!
//! ```no_run
//! use tickr_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TickrClient::builder()
//!         .with_api_key("sk_live_...")
//!         .with_max_retries(5)
//!         .build()?;
//!
//!     // One-shot REST queries
//!     let candles = client
//!         .history()
//!         .ohlcv("binance", "BTC/USDT", &OhlcvQuery::new(Timeframe::H1).limit(24))
//!         .await?;
//!     println!("{} hourly candles", candles.len());
//!
//!     // Live updates
//!     let session = client.streaming();
//!     session.on_ticker(|t| println!("{} {:?}", t.symbol, t.data.last));
//!     session.subscribe([ticker_channel("binance", "BTC/USDT")]);
//!     session.connect()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     session.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Retries**: exponential backoff with jitter, honouring `Retry-After`
//! - **Rate limits**: latest quota counters kept on the client
//! - **Streaming**: handshake-gated session with automatic reconnection and
//!   subscription restore
//! - **Testable**: HTTP and streaming transports are swappable

pub mod builder;
pub mod client;
pub mod prelude;

// Re-export main types
pub use builder::{ConfigError, TickrClientBuilder};
pub use client::TickrClient;

// Re-export commonly used types from dependencies
pub use tickr_rest::{RestClient, RestConfig, RetryContext, RetryOptions, RetryOverrides};
pub use tickr_types::{ApiKey, ErrorCode, RateLimitInfo, SdkError, SdkResult};
pub use tickr_ws::{
    ReconnectConfig, SessionEvent, SessionState, StreamingConfig, StreamingSession,
};

//! Re-exports for convenience
//!
//! Import everything you need with:
//! ```
//! use tickr_sdk::prelude::*;
//! ```

// Client
pub use crate::builder::{ConfigError, TickrClientBuilder};
pub use crate::client::TickrClient;

// Types from tickr-types
pub use tickr_types::{
    exchange_ticker_channel, is_retryable, symbol_from_url, symbol_to_url, ticker_channel,
    ApiKey, Channel, ErrorCode, RateLimitInfo, SdkError, SdkResult, Symbol,
    // Resource records
    Exchange, HealthStatus, Market, Ohlcv, Ticker, Timeframe,
    // Streaming payloads
    TickData, TickerUpdate,
};

// REST types
pub use tickr_rest::{
    HistoryQuery, MarketQuery, OhlcvQuery, QueryParams, RequestOptions, RestClient, RestConfig,
    RetryContext, RetryOptions, RetryOverrides,
};

// Streaming types
pub use tickr_ws::{
    EventKind, ListenerId, ReconnectConfig, ServerInfo, SessionError, SessionEvent,
    SessionState, StreamingConfig, StreamingSession,
};

// Decimal for prices and volumes
pub use rust_decimal::Decimal;

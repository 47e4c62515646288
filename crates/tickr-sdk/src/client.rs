//! High-level Tickr client

use crate::builder::{ConfigError, TickrClientBuilder};
use std::sync::Arc;
use tickr_rest::endpoints::{
    ExchangeEndpoints, HistoryEndpoints, MarketEndpoints, SystemEndpoints, TickerEndpoints,
};
use tickr_rest::RestClient;
use tickr_types::{ticker_channel, HealthStatus, RateLimitInfo, SdkResult};
use tickr_ws::{Connector, StreamingConfig, StreamingSession};
use tracing::{info, instrument};

/// High-level client for the Tickr pricing API
///
/// Wraps one REST pipeline and hands out streaming sessions that share its
/// credential. Cloning is cheap and clones share rate-limit state.
///
/// # Example
///
/// ```no_run
/// use tickr_sdk::TickrClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = TickrClient::from_env()?;
///
///     let ticker = client.tickers().get("binance", "BTC/USDT").await?;
///     println!("BTC/USDT last: {:?}", ticker.last);
///
///     let session = client.stream_tickers("binance", &["BTC/USDT", "ETH/USDT"])?;
///     let mut events = session.events();
///     while let Some(event) = events.recv().await {
///         println!("{:?}", event);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TickrClient {
    rest: RestClient,
    streaming: StreamingConfig,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for TickrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickrClient")
            .field("rest", &self.rest)
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

impl TickrClient {
    /// Create a new client builder
    pub fn builder() -> TickrClientBuilder {
        TickrClientBuilder::new()
    }

    /// Create a client for `api_key` with default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        TickrClientBuilder::new().with_api_key(api_key).build()
    }

    /// Create a client from `TICKR_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        TickrClientBuilder::from_env().build()
    }

    pub(crate) fn from_parts(
        rest: RestClient,
        streaming: StreamingConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        info!(
            base_url = %rest.config().base_url,
            stream_url = %streaming.url,
            "Created Tickr client"
        );
        Self {
            rest,
            streaming,
            connector,
        }
    }

    /// Underlying REST client
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Configuration used for new streaming sessions
    pub fn streaming_config(&self) -> &StreamingConfig {
        &self.streaming
    }

    /// Rate-limit counters from the most recent REST response that carried them
    pub fn rate_limit_info(&self) -> Option<RateLimitInfo> {
        self.rest.rate_limit_info()
    }

    pub fn exchanges(&self) -> ExchangeEndpoints<'_> {
        self.rest.exchanges()
    }

    pub fn markets(&self) -> MarketEndpoints<'_> {
        self.rest.markets()
    }

    pub fn tickers(&self) -> TickerEndpoints<'_> {
        self.rest.tickers()
    }

    pub fn history(&self) -> HistoryEndpoints<'_> {
        self.rest.history()
    }

    pub fn system(&self) -> SystemEndpoints<'_> {
        self.rest.system()
    }

    pub async fn health(&self) -> SdkResult<HealthStatus> {
        self.rest.health().await
    }

    /// Create a new, unconnected streaming session
    ///
    /// Every call returns an independent session with its own link and
    /// subscriptions.
    pub fn streaming(&self) -> StreamingSession {
        StreamingSession::with_connector(self.streaming.clone(), self.connector.clone())
    }

    /// Open a session subscribed to ticker channels for `symbols` on `exchange`
    ///
    /// The subscriptions go out once the server handshake arrives. Must be
    /// called from within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn stream_tickers(&self, exchange: &str, symbols: &[&str]) -> SdkResult<StreamingSession> {
        let session = self.streaming();
        session.subscribe(symbols.iter().map(|symbol| ticker_channel(exchange, symbol)));
        session.connect()?;
        Ok(session)
    }
}

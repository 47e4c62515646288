//! Client Builder Pattern
//!
//! Composes the REST and streaming configuration behind one fluent API and
//! validates it before any client is created.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tickr_sdk::builder::TickrClientBuilder;
//!
//! let client = TickrClientBuilder::new()
//!     .with_api_key("sk_live_...")
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_retries(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(client.rest().config().retry.max_retries, 5);
//! ```

use crate::client::TickrClient;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tickr_rest::transport::HttpTransport;
use tickr_rest::{RestClient, RestConfig, RetryContext, RetryHook, RetryOptions};
use tickr_types::ApiKey;
use tickr_ws::{Connector, ReconnectConfig, StreamingConfig, TungsteniteConnector};

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// API key given but empty
    #[error("API key must not be empty")]
    EmptyApiKey,

    /// URL failed to parse or has the wrong scheme
    #[error("invalid {field}: {url} ({reason})")]
    InvalidUrl {
        field: &'static str,
        url: String,
        reason: String,
    },

    /// A timeout of zero would fail every call
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    /// Backoff must not shrink between attempts
    #[error("backoff multiplier must be a finite number >= 1.0, got {0}")]
    InvalidBackoffMultiplier(f64),

    /// The default HTTP transport could not be created
    #[error("failed to initialize HTTP transport: {0}")]
    HttpTransport(String),
}

/// Builder for configuring a Tickr client
///
/// The API key, when set, is shared by the REST pipeline and the streaming
/// upgrade request. Custom transports replace the `reqwest` and
/// `tokio-tungstenite` defaults.
#[derive(Clone, Default)]
pub struct TickrClientBuilder {
    api_key: Option<ApiKey>,
    rest: RestConfig,
    streaming: StreamingConfig,
    http_transport: Option<Arc<dyn HttpTransport>>,
    connector: Option<Arc<dyn Connector>>,
    on_retry: Option<Arc<RetryHook>>,
}

impl std::fmt::Debug for TickrClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickrClientBuilder")
            .field("api_key", &self.api_key)
            .field("rest", &self.rest)
            .field("streaming", &self.streaming)
            .field("custom_http_transport", &self.http_transport.is_some())
            .field("custom_connector", &self.connector.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl TickrClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from environment variables
    ///
    /// Reads `TICKR_API_KEY`, `TICKR_BASE_URL`, `TICKR_TIMEOUT_MS` and
    /// `TICKR_WS_URL`. Unset variables keep their defaults.
    pub fn from_env() -> Self {
        Self {
            api_key: ApiKey::from_env(),
            rest: RestConfig::from_env(),
            streaming: StreamingConfig::from_env(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::new(api_key));
        self
    }

    /// REST base URL (default `https://api.tickr.io/v1`)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest.base_url = url.into();
        self
    }

    /// Streaming URL (default `wss://stream.tickr.io/v1`)
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.streaming.url = url.into();
        self
    }

    /// Per-attempt REST deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.rest.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.rest.user_agent = user_agent.into();
        self
    }

    /// Client-level retry settings
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.rest.retry = retry;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.rest.retry.max_retries = max_retries;
        self
    }

    /// Disable REST retries
    pub fn without_retry(mut self) -> Self {
        self.rest.retry = RetryOptions::no_retry();
        self
    }

    /// Called before every REST retry wait
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RetryContext<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.streaming.reconnect = reconnect;
        self
    }

    /// Disable automatic stream reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.streaming.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Streaming ping period (zero disables)
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.streaming.heartbeat_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.streaming.connect_timeout = timeout;
        self
    }

    /// Replace the `reqwest` transport
    pub fn with_http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    /// Replace the `tokio-tungstenite` connector
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.as_ref().is_some_and(ApiKey::is_blank) {
            return Err(ConfigError::EmptyApiKey);
        }

        check_url("base URL", &self.rest.base_url, &["http", "https"])?;
        check_url("stream URL", &self.streaming.url, &["ws", "wss"])?;

        if self.rest.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "request timeout",
            });
        }
        if self.streaming.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                field: "connect timeout",
            });
        }

        let multiplier = self.rest.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoffMultiplier(multiplier));
        }

        Ok(())
    }

    /// Validate and create the client
    pub fn build(self) -> Result<TickrClient, ConfigError> {
        self.validate()?;

        let Self {
            api_key,
            mut rest,
            mut streaming,
            http_transport,
            connector,
            on_retry,
        } = self;

        if let Some(key) = api_key {
            rest.api_key = Some(key.clone());
            streaming.api_key = Some(key);
        }

        let mut rest_client = match http_transport {
            Some(transport) => RestClient::with_transport(rest, transport),
            None => RestClient::new(rest).map_err(|e| ConfigError::HttpTransport(e.to_string()))?,
        };
        if let Some(hook) = on_retry {
            rest_client = rest_client.with_retry_hook(move |ctx| hook(ctx));
        }

        let connector = connector.unwrap_or_else(|| Arc::new(TungsteniteConnector::new()));
        Ok(TickrClient::from_parts(rest_client, streaming, connector))
    }
}

fn check_url(field: &'static str, url: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field,
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(invalid(format!(
            "scheme must be one of {}",
            schemes.join(", ")
        )));
    }
    Ok(())
}

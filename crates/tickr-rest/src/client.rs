//! Request pipeline
//!
//! [`RestClient::request`] is the single path every REST call takes: build the
//! URL and headers once, then run a single-attempt executor inside
//! [`with_retry`]. Each attempt runs under the configured deadline, records the
//! latest rate-limit headers and maps failures into [`SdkError`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use tickr_types::{ApiKey, HealthStatus, RateLimitInfo, SdkError, SdkResult, Timeframe};
use tracing::{debug, info, warn};

use crate::endpoints::{
    ExchangeEndpoints, HistoryEndpoints, MarketEndpoints, SystemEndpoints, TickerEndpoints,
};
use crate::response::{error_from_response, parse_rate_limit_headers};
use crate::retry::{with_retry, RetryContext, RetryHook, RetryOptions, RetryOverrides};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};

/// Production REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.tickr.io/v1";

/// Default per-attempt deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "TICKR_BASE_URL";

/// Environment variable overriding the request timeout (milliseconds)
pub const TIMEOUT_ENV: &str = "TICKR_TIMEOUT_MS";

const JSON: &str = "application/json";

/// REST client configuration
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL every path is appended to
    pub base_url: String,
    /// Credential sent as a bearer token on authenticated calls
    pub api_key: Option<ApiKey>,
    /// Deadline for a single attempt
    pub timeout: Duration,
    /// Client-level retry settings; per-call overrides are merged on top
    pub retry: RetryOptions,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryOptions::default(),
            user_agent: concat!("tickr-rest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RestConfig {
    /// Create a config for the given key with default settings
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key: Some(api_key),
            ..Default::default()
        }
    }

    /// Build a config from `TICKR_API_KEY`, `TICKR_BASE_URL` and `TICKR_TIMEOUT_MS`
    ///
    /// Unset variables keep their defaults. An unparseable timeout is ignored.
    pub fn from_env() -> Self {
        let mut config = Self {
            api_key: ApiKey::from_env(),
            ..Default::default()
        };
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.timeout = Duration::from_millis(ms),
                _ => warn!(value = %raw, "Ignoring invalid {}", TIMEOUT_ENV),
            }
        }
        config
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: ApiKey) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

// ============================================================================
// Query parameters
// ============================================================================

/// A query parameter value in its canonical string form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryValue(String);

impl QueryValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<&String> for QueryValue {
    fn from(v: &String) -> Self {
        Self(v.clone())
    }
}

impl From<Timeframe> for QueryValue {
    fn from(v: Timeframe) -> Self {
        Self(v.as_str().to_string())
    }
}

macro_rules! query_value_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for QueryValue {
                fn from(v: $t) -> Self {
                    Self(v.to_string())
                }
            }
        )*
    };
}

query_value_from_display!(bool, u16, u32, u64, i32, i64, f64, tickr_types::Decimal);

/// Ordered query parameters; unset values are never added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` when `value` is set
    pub fn set<V: Into<QueryValue>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.0.push((key.to_string(), value.into().0));
        }
        self
    }

    /// Add `key` unconditionally
    pub fn insert(self, key: &str, value: impl Into<QueryValue>) -> Self {
        self.set(key, Some(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// URL-encoded `a=1&b=2` form
    pub fn encode(&self) -> SdkResult<String> {
        serde_urlencoded::to_string(&self.0).map_err(|e| {
            SdkError::validation(format!("Invalid query parameters: {}", e), None).with_cause(e)
        })
    }
}

/// Per-call options for [`RestClient::request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub query: QueryParams,
    /// Send the bearer credential (default: true)
    pub authenticated: bool,
    /// Merged over the client-level retry settings
    pub retry: RetryOverrides,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: QueryParams::default(),
            authenticated: true,
            retry: RetryOverrides::default(),
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Skip the bearer credential
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn with_retry(mut self, retry: RetryOverrides) -> Self {
        self.retry = retry;
        self
    }
}

// ============================================================================
// Client
// ============================================================================

/// Tickr REST API client
///
/// Cheap to clone; clones share the transport and the rate-limit record.
///
/// # Example
///
/// ```no_run
/// use tickr_rest::{RestClient, RestConfig};
/// use tickr_types::ApiKey;
///
/// #[tokio::main]
/// async fn main() -> Result<(), tickr_types::SdkError> {
///     let client = RestClient::new(RestConfig::new(ApiKey::new("sk_live_...")))?;
///     let ticker = client.tickers().get("binance", "BTC/USDT").await?;
///     println!("BTC/USDT last: {:?}", ticker.last);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RestClient {
    config: Arc<RestConfig>,
    transport: Arc<dyn HttpTransport>,
    rate_limit: Arc<RwLock<Option<RateLimitInfo>>>,
    on_retry: Option<Arc<RetryHook>>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("config", &self.config)
            .field("rate_limit", &*self.rate_limit.read())
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client backed by `reqwest`
    pub fn new(config: RestConfig) -> SdkResult<Self> {
        let transport = ReqwestTransport::new()
            .map_err(|e| SdkError::network("Failed to initialize HTTP transport").with_cause(e))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a caller-supplied transport
    pub fn with_transport(config: RestConfig, transport: Arc<dyn HttpTransport>) -> Self {
        info!(base_url = %config.base_url, "Created Tickr REST client");
        Self {
            config: Arc::new(config),
            transport,
            rate_limit: Arc::new(RwLock::new(None)),
            on_retry: None,
        }
    }

    /// Install a hook called before every retry wait
    pub fn with_retry_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RetryContext<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Rate-limit counters from the most recent response that carried them
    pub fn rate_limit_info(&self) -> Option<RateLimitInfo> {
        *self.rate_limit.read()
    }

    // ========================================================================
    // Resource facades
    // ========================================================================

    pub fn exchanges(&self) -> ExchangeEndpoints<'_> {
        ExchangeEndpoints::new(self)
    }

    pub fn markets(&self) -> MarketEndpoints<'_> {
        MarketEndpoints::new(self)
    }

    pub fn tickers(&self) -> TickerEndpoints<'_> {
        TickerEndpoints::new(self)
    }

    pub fn history(&self) -> HistoryEndpoints<'_> {
        HistoryEndpoints::new(self)
    }

    pub fn system(&self) -> SystemEndpoints<'_> {
        SystemEndpoints::new(self)
    }

    /// Service liveness probe (unauthenticated)
    pub async fn health(&self) -> SdkResult<HealthStatus> {
        self.system().health().await
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Issue a GET for `path` and parse the JSON body as `T`
    ///
    /// An empty success body parses as JSON `null`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> SdkResult<T> {
        let retry = options.retry.merged_over(&self.config.retry);
        let url = self.build_url(path, &options.query)?;
        let headers = self.build_headers(options.authenticated)?;

        let hook = |ctx: &RetryContext<'_>| {
            if let Some(user_hook) = &self.on_retry {
                user_hook(ctx);
            }
        };

        let url = url.as_str();
        let headers = &headers;
        with_retry(
            move || self.execute_once::<T>(url, headers),
            &retry,
            Some(&hook),
        )
        .await
    }

    fn build_url(&self, path: &str, query: &QueryParams) -> SdkResult<String> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.encode()?);
        }
        Ok(url)
    }

    fn build_headers(&self, authenticated: bool) -> SdkResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        if let Ok(agent) = HeaderValue::from_str(&self.config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        if authenticated {
            let key = self
                .config
                .api_key
                .as_ref()
                .ok_or_else(|| SdkError::auth("An API key is required for this request"))?;
            let mut value = HeaderValue::from_str(&key.bearer())
                .map_err(|_| SdkError::auth("API key contains characters not allowed in a header"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    async fn execute_once<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> SdkResult<T> {
        let request = HttpRequest {
            method: reqwest::Method::GET,
            url: url.to_string(),
            headers: headers.clone(),
        };

        debug!(url = %url, "Sending request");
        let timeout = self.config.timeout;
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(error = %e, "Transport failure");
                return Err(SdkError::network(e.to_string()).with_cause(e));
            }
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Request deadline expired");
                return Err(SdkError::timeout(timeout));
            }
        };

        if let Some(info) = parse_rate_limit_headers(&response.headers) {
            *self.rate_limit.write() = Some(info);
        }

        if !response.is_success() {
            return Err(error_from_response(&response));
        }

        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| {
            SdkError::network(format!("Failed to parse response body: {}", e))
                .with_status(response.status)
                .with_cause(e)
        })
    }
}

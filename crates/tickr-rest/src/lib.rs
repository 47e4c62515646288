//! REST client for the Tickr cryptocurrency pricing API
//!
//! Every call goes through one request pipeline:
//!
//! - **Deadline**: each attempt runs under the configured timeout
//! - **Classification**: transport and HTTP failures become [`SdkError`]s
//! - **Retry**: retryable failures are retried with exponential backoff and
//!   jitter, honouring the server's `Retry-After` hint on 429s
//! - **Rate limits**: the latest `X-RateLimit-*` headers are kept on the client
//!
//! # Example
//!
//! ```no_run
//! use tickr_rest::{MarketQuery, RestClient, RestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tickr_types::SdkError> {
//!     let client = RestClient::new(RestConfig::from_env())?;
//!
//!     let markets = client
//!         .markets()
//!         .list("binance", &MarketQuery::new().quote("USDT").limit(20))
//!         .await?;
//!     println!("{} USDT markets", markets.len());
//!
//!     if let Some(quota) = client.rate_limit_info() {
//!         println!("{} of {} requests left", quota.remaining, quota.limit);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoints;
pub mod response;
pub mod retry;
pub mod transport;

// Re-export main types
pub use client::{QueryParams, QueryValue, RequestOptions, RestClient, RestConfig};
pub use endpoints::{HistoryQuery, MarketQuery, OhlcvQuery};
pub use response::{error_from_response, parse_rate_limit_headers};
pub use retry::{
    calculate_delay, resolve_retry_options, with_retry, RetryContext, RetryHook, RetryOptions,
    RetryOverrides,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockHttpTransport;

pub use tickr_types::{SdkError, SdkResult};

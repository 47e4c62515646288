//! Resource facades
//!
//! Each facade formats a path and query string and hands them to
//! [`RestClient::request`](crate::RestClient::request).

pub mod exchanges;
pub mod history;
pub mod markets;
pub mod system;
pub mod tickers;

pub use exchanges::ExchangeEndpoints;
pub use history::{HistoryEndpoints, HistoryQuery, OhlcvQuery};
pub use markets::{MarketEndpoints, MarketQuery};
pub use system::SystemEndpoints;
pub use tickers::TickerEndpoints;

use reqwest::Url;
use tickr_types::{SdkError, SdkResult};

/// Join `segments` into an absolute path, percent-encoding each one
pub(crate) fn encode_path(segments: &[&str]) -> SdkResult<String> {
    let mut url = Url::parse("http://localhost/").map_err(|e| SdkError::new(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| SdkError::new("URL cannot carry a path"))?
        .clear()
        .extend(segments);
    Ok(url.path().to_string())
}

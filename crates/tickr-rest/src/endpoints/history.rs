//! Historical data endpoints

use tickr_types::{symbol_to_url, Ohlcv, SdkResult, Ticker, Timeframe};
use tracing::{debug, instrument};

use super::encode_path;
use crate::client::{QueryParams, RequestOptions, RestClient};

/// Window for [`HistoryEndpoints::ohlcv`]
#[derive(Debug, Clone, Default)]
pub struct OhlcvQuery {
    pub timeframe: Option<Timeframe>,
    /// Start, milliseconds since the Unix epoch
    pub since: Option<i64>,
    /// End, milliseconds since the Unix epoch
    pub until: Option<i64>,
    pub limit: Option<u32>,
}

impl OhlcvQuery {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe: Some(timeframe),
            ..Default::default()
        }
    }

    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .set("timeframe", self.timeframe)
            .set("since", self.since)
            .set("until", self.until)
            .set("limit", self.limit)
    }
}

/// Window for [`HistoryEndpoints::tickers`]
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .set("since", self.since)
            .set("until", self.until)
            .set("limit", self.limit)
    }
}

/// `/history/{exchange}/{symbol}`
pub struct HistoryEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> HistoryEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// OHLCV candles for a pair
    #[instrument(skip(self))]
    pub async fn ohlcv(
        &self,
        exchange: &str,
        symbol: &str,
        query: &OhlcvQuery,
    ) -> SdkResult<Vec<Ohlcv>> {
        debug!("Fetching candles");
        self.client
            .request(
                &encode_path(&["history", exchange, symbol_to_url(symbol).as_str(), "ohlcv"])?,
                RequestOptions::new().with_query(query.to_params()),
            )
            .await
    }

    /// Recorded ticker snapshots for a pair
    #[instrument(skip(self))]
    pub async fn tickers(
        &self,
        exchange: &str,
        symbol: &str,
        query: &HistoryQuery,
    ) -> SdkResult<Vec<Ticker>> {
        self.client
            .request(
                &encode_path(&["history", exchange, symbol_to_url(symbol).as_str(), "tickers"])?,
                RequestOptions::new().with_query(query.to_params()),
            )
            .await
    }
}

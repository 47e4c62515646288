//! Market endpoints

use tickr_types::{symbol_to_url, Market, SdkResult};
use tracing::{debug, instrument};

use super::encode_path;
use crate::client::{QueryParams, RequestOptions, RestClient};

/// Filters for [`MarketEndpoints::list`]
#[derive(Debug, Clone, Default)]
pub struct MarketQuery {
    /// Base currency (`BTC`)
    pub base: Option<String>,
    /// Quote currency (`USDT`)
    pub quote: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl MarketQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = Some(quote.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .set("base", self.base.as_ref())
            .set("quote", self.quote.as_ref())
            .set("active", self.active)
            .set("limit", self.limit)
            .set("offset", self.offset)
    }
}

/// `/exchanges/{exchange}/markets`
pub struct MarketEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> MarketEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// List markets on an exchange
    #[instrument(skip(self))]
    pub async fn list(&self, exchange: &str, query: &MarketQuery) -> SdkResult<Vec<Market>> {
        debug!("Fetching markets");
        self.client
            .request(
                &encode_path(&["exchanges", exchange, "markets"])?,
                RequestOptions::new().with_query(query.to_params()),
            )
            .await
    }

    /// Get one market by normalized symbol (`BTC/USDT`)
    #[instrument(skip(self))]
    pub async fn get(&self, exchange: &str, symbol: &str) -> SdkResult<Market> {
        self.client
            .request(
                &encode_path(&["exchanges", exchange, "markets", symbol_to_url(symbol).as_str()])?,
                RequestOptions::new(),
            )
            .await
    }
}

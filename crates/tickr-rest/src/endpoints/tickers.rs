//! Ticker snapshot endpoints

use tickr_types::{symbol_to_url, SdkResult, Ticker};
use tracing::{debug, instrument};

use super::encode_path;
use crate::client::{QueryParams, RequestOptions, RestClient};

/// `/tickers/{exchange}`
pub struct TickerEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> TickerEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// Current tickers on an exchange
    ///
    /// # Arguments
    /// * `symbols` - Optional filter of normalized symbols (e.g. `["BTC/USDT", "ETH/USDT"]`)
    #[instrument(skip(self))]
    pub async fn list(&self, exchange: &str, symbols: Option<&[&str]>) -> SdkResult<Vec<Ticker>> {
        let symbols = symbols.filter(|s| !s.is_empty()).map(|s| {
            s.iter()
                .map(|sym| symbol_to_url(sym))
                .collect::<Vec<_>>()
                .join(",")
        });
        debug!("Fetching tickers");

        self.client
            .request(
                &encode_path(&["tickers", exchange])?,
                RequestOptions::new().with_query(QueryParams::new().set("symbols", symbols)),
            )
            .await
    }

    /// Current ticker for one pair
    #[instrument(skip(self))]
    pub async fn get(&self, exchange: &str, symbol: &str) -> SdkResult<Ticker> {
        self.client
            .request(
                &encode_path(&["tickers", exchange, symbol_to_url(symbol).as_str()])?,
                RequestOptions::new(),
            )
            .await
    }
}

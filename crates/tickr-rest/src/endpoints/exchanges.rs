//! Exchange endpoints

use tickr_types::{Exchange, SdkResult};
use tracing::{debug, instrument};

use super::encode_path;
use crate::client::{RequestOptions, RestClient};

/// `/exchanges`
pub struct ExchangeEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> ExchangeEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// List supported exchanges
    #[instrument(skip(self))]
    pub async fn list(&self) -> SdkResult<Vec<Exchange>> {
        debug!("Fetching exchanges");
        self.client.request("/exchanges", RequestOptions::new()).await
    }

    /// Get one exchange by id (e.g. `binance`)
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> SdkResult<Exchange> {
        self.client
            .request(&encode_path(&["exchanges", id])?, RequestOptions::new())
            .await
    }
}

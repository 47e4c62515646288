//! Service status endpoints
//!
//! These endpoints don't require authentication.

use tickr_types::{HealthStatus, SdkResult};
use tracing::instrument;

use crate::client::{RequestOptions, RestClient};

pub struct SystemEndpoints<'a> {
    client: &'a RestClient,
}

impl<'a> SystemEndpoints<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }

    /// Liveness probe
    #[instrument(skip(self))]
    pub async fn health(&self) -> SdkResult<HealthStatus> {
        self.client
            .request("/health", RequestOptions::new().unauthenticated())
            .await
    }
}

//! Common test utilities and fixtures for integration tests
//!
//! Wire samples mirror what the Tickr REST and streaming APIs return.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tickr_rest::{HttpResponse, MockHttpTransport, RetryOptions};
use tickr_sdk::{TickrClient, TickrClientBuilder};
use tickr_ws::{MockConnection, MockConnector};

pub const API_KEY: &str = "sk_test_integration";

/// Handshake sent by the streaming server after the transport opens
pub const CONNECTED_MESSAGE: &str = r#"{
    "type": "connected",
    "tier": "pro",
    "limits": {"maxSubscriptions": 100}
}"#;

/// Pong reply to a client ping
pub const PONG_MESSAGE: &str = r#"{"type": "pong", "timestamp": 1718000000123}"#;

/// Live ticker for BTC/USDT on binance
pub const TICKER_MESSAGE: &str = r#"{
    "type": "ticker",
    "exchange": "binance",
    "symbol": "BTC/USDT",
    "data": {
        "last": "64012.35",
        "bid": "64012.30",
        "ask": "64012.40",
        "high": "65100.00",
        "low": "63050.10",
        "volume": "18234.551",
        "quoteVolume": "1167000000.12",
        "change": "512.35",
        "percentage": "0.81"
    },
    "timestamp": 1718000000000
}"#;

/// Confirmation message for `channel`
pub fn subscribed_message(channel: &str) -> String {
    json!({"type": "subscribed", "channel": channel}).to_string()
}

pub fn exchanges_body() -> Value {
    json!([
        {"id": "binance", "name": "Binance", "url": "https://binance.com", "countries": ["MT"], "active": true},
        {"id": "kraken", "name": "Kraken", "countries": ["US"], "active": true}
    ])
}

pub fn ticker_body() -> Value {
    json!({
        "exchange": "binance",
        "symbol": "BTC/USDT",
        "last": "64012.35",
        "bid": "64012.30",
        "ask": "64012.40",
        "volume": "18234.551",
        "timestamp": 1718000000000i64
    })
}

pub fn ohlcv_body() -> Value {
    json!([
        {"timestamp": 1717999200000i64, "open": "63900.0", "high": "64100.5", "low": "63850.0", "close": "64050.2", "volume": "812.4"},
        {"timestamp": 1718002800000i64, "open": "64050.2", "high": "64200.0", "low": "63990.1", "close": "64010.0", "volume": "655.0"}
    ])
}

/// JSON response carrying the three core rate-limit headers
pub fn with_rate_limit(body: &Value, limit: u64, remaining: u64, reset: i64) -> HttpResponse {
    HttpResponse::json(body)
        .with_header("X-RateLimit-Limit", &limit.to_string())
        .with_header("X-RateLimit-Remaining", &remaining.to_string())
        .with_header("X-RateLimit-Reset", &reset.to_string())
}

/// Client wired to scripted transports
pub struct TestClient {
    pub client: TickrClient,
    pub http: Arc<MockHttpTransport>,
    pub ws: Arc<MockConnector>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with(|b| b)
    }

    /// Customize the builder before the mocks are attached
    pub fn with(configure: impl FnOnce(TickrClientBuilder) -> TickrClientBuilder) -> Self {
        Self::with_http(MockHttpTransport::new(), configure)
    }

    pub fn with_http(
        http: MockHttpTransport,
        configure: impl FnOnce(TickrClientBuilder) -> TickrClientBuilder,
    ) -> Self {
        let http = Arc::new(http);
        let ws = Arc::new(MockConnector::new());
        let builder = TickrClient::builder()
            .with_api_key(API_KEY)
            .with_base_url("https://api.test/v1")
            .with_stream_url("wss://stream.test/v1")
            .with_retry(RetryOptions::default().with_jitter(false))
            .with_heartbeat_interval(Duration::ZERO);
        let client = configure(builder)
            .with_http_transport(http.clone())
            .with_connector(ws.clone())
            .build()
            .expect("valid test configuration");
        Self { client, http, ws }
    }

    /// Most recent streaming link
    pub fn link(&self) -> MockConnection {
        self.ws.last_connection().expect("no streaming connection")
    }
}

/// Let spawned tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

//! Integration tests for the Tickr SDK
//!
//! Drives the full client over scripted HTTP and streaming transports.

mod common;

use common::*;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tickr_rest::{calculate_delay, HttpResponse, MockHttpTransport, RetryOptions};
use tickr_sdk::prelude::*;

// =============================================================================
// REST
// =============================================================================

#[tokio::test]
async fn test_list_exchanges_sends_bearer_and_parses() {
    let t = TestClient::new();
    t.http.push_json(200, exchanges_body());

    let exchanges = t.client.exchanges().list().await.unwrap();
    assert_eq!(exchanges.len(), 2);
    assert_eq!(exchanges[0].id, "binance");
    assert_eq!(exchanges[1].url, None);

    let req = t.http.last_request().unwrap();
    assert_eq!(req.url, "https://api.test/v1/exchanges");
    assert_eq!(
        req.header("authorization"),
        Some(format!("Bearer {}", API_KEY).as_str())
    );
}

#[tokio::test]
async fn test_symbols_are_dashed_in_paths_and_queries() {
    let t = TestClient::new();
    t.http.push_json(200, ticker_body());
    t.http.push_json(200, json!([ticker_body()]));
    t.http.push_json(200, ohlcv_body());

    let ticker = t.client.tickers().get("binance", "BTC/USDT").await.unwrap();
    assert_eq!(ticker.last, Some(dec!(64012.35)));
    assert_eq!(
        t.http.last_request().unwrap().url,
        "https://api.test/v1/tickers/binance/BTC-USDT"
    );

    t.client
        .tickers()
        .list("binance", Some(&["BTC/USDT", "ETH/USDT"]))
        .await
        .unwrap();
    assert_eq!(
        t.http.last_request().unwrap().url,
        "https://api.test/v1/tickers/binance?symbols=BTC-USDT%2CETH-USDT"
    );

    let candles = t
        .client
        .history()
        .ohlcv("binance", "BTC/USDT", &OhlcvQuery::new(Timeframe::H1).limit(2))
        .await
        .unwrap();
    assert_eq!(candles.len(), 2);
    assert!(candles[0].is_bullish());
    assert_eq!(
        t.http.last_request().unwrap().url,
        "https://api.test/v1/history/binance/BTC-USDT/ohlcv?timeframe=1h&limit=2"
    );
}

#[tokio::test]
async fn test_health_is_unauthenticated() {
    let t = TestClient::new();
    t.http.push_json(200, json!({"status": "ok", "version": "1.4.2"}));

    let health = t.client.health().await.unwrap();
    assert!(health.is_ok());
    assert_eq!(t.http.last_request().unwrap().header("authorization"), None);
}

#[tokio::test]
async fn test_rate_limit_info_tracks_latest_complete_headers() {
    let t = TestClient::new();
    assert!(t.client.rate_limit_info().is_none());

    t.http
        .push_response(with_rate_limit(&exchanges_body(), 1000, 998, 1718003600));
    t.client.exchanges().list().await.unwrap();
    let info = t.client.rate_limit_info().unwrap();
    assert_eq!((info.limit, info.remaining, info.reset), (1000, 998, 1718003600));

    // Missing reset: the previous snapshot stays
    t.http.push_response(
        HttpResponse::json(&exchanges_body())
            .with_header("X-RateLimit-Limit", "1000")
            .with_header("X-RateLimit-Remaining", "997"),
    );
    t.client.exchanges().list().await.unwrap();
    assert_eq!(t.client.rate_limit_info().unwrap().remaining, 998);

    // Clones share the same snapshot
    let clone = t.client.clone();
    assert_eq!(clone.rate_limit_info(), t.client.rate_limit_info());
}

#[tokio::test]
async fn test_429_without_body_is_rate_limit_error() {
    let t = TestClient::with(|b| b.without_retry());
    t.http
        .push_response(HttpResponse::new(429, "").with_header("Retry-After", "60"));

    let err = t.client.exchanges().list().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RateLimit);
    assert_eq!(err.status(), Some(429));
    assert_eq!(err.retry_after_seconds(), Some(60));
    assert!(err.rate_limit_info().is_some());
    assert!(err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhaust_with_last_error_and_hook_calls() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let t = TestClient::with(move |b| {
        b.on_retry(move |ctx| {
            recorder
                .lock()
                .unwrap()
                .push((ctx.attempt, ctx.max_retries, ctx.error.status()));
        })
    });
    for status in [500, 502, 503, 504] {
        t.http
            .push_json(status, json!({"message": format!("upstream {}", status)}));
    }

    let start = tokio::time::Instant::now();
    let err = t.client.markets().get("binance", "BTC/USDT").await.unwrap_err();

    assert_eq!(t.http.request_count(), 4);
    assert_eq!(err.code(), ErrorCode::Server);
    assert_eq!(err.status(), Some(504));
    assert_eq!(err.message(), "upstream 504");
    // 1s + 2s + 4s without jitter
    assert_eq!(start.elapsed(), Duration::from_secs(7));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (1, 3, Some(500)),
            (2, 3, Some(502)),
            (3, 3, Some(503))
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_failure() {
    let t = TestClient::new();
    t.http.push_json(503, json!({}));
    t.http
        .push_response(HttpResponse::new(429, "").with_header("Retry-After", "2"));
    t.http.push_json(200, exchanges_body());

    let start = tokio::time::Instant::now();
    let exchanges = t.client.exchanges().list().await.unwrap();
    assert_eq!(exchanges.len(), 2);
    // 1s backoff, then the 2s hint plus buffer
    assert_eq!(start.elapsed(), Duration::from_millis(3100));
}

#[tokio::test]
async fn test_non_retryable_errors_fail_once() {
    let t = TestClient::new();
    t.http.push_response(
        HttpResponse::new(404, r#"{"message": "Unknown exchange", "correlationId": "req-42"}"#)
            .with_status_text("Not Found"),
    );

    let err = t.client.exchanges().get("nope").await.unwrap_err();
    assert_eq!(t.http.request_count(), 1);
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "Unknown exchange");
    assert_eq!(err.correlation_id(), Some("req-42"));
    assert!(!is_retryable(&err));
}

#[tokio::test]
async fn test_validation_error_carries_details() {
    let t = TestClient::new();
    t.http.push_json(
        400,
        json!({"message": "limit too large", "details": {"limit": "max 1000"}}),
    );

    let err = t
        .client
        .markets()
        .list("binance", &MarketQuery::new().limit(5000))
        .await
        .unwrap_err();
    assert_eq!(t.http.request_count(), 1);
    assert_eq!(err.code(), ErrorCode::Validation);
    assert_eq!(err.details().unwrap()["limit"], json!("max 1000"));
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let t = TestClient::with_http(
        MockHttpTransport::new().with_latency(Duration::from_secs(5)),
        |b| b.with_timeout(Duration::from_secs(1)).without_retry(),
    );
    t.http.push_json(200, exchanges_body());

    let err = t.client.exchanges().list().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Timeout);
    assert_eq!(err.timeout_ms(), Some(1000));
    assert_eq!(err.message(), "Request timed out after 1000ms");
}

#[tokio::test]
async fn test_missing_key_fails_before_network() {
    let t = TestClient::with_http(MockHttpTransport::new(), |_| {
        TickrClient::builder()
            .with_base_url("https://api.test/v1")
            .with_stream_url("wss://stream.test/v1")
    });
    t.http.push_json(200, exchanges_body());

    let err = t.client.exchanges().list().await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Auth);
    assert_eq!(t.http.request_count(), 0);
}

// =============================================================================
// Retry policy
// =============================================================================

#[test]
fn test_backoff_without_jitter() {
    let options = RetryOptions::default().with_jitter(false);
    for attempt in 0..12u32 {
        let expected = (1000u64 * 2u64.pow(attempt)).min(30_000);
        assert_eq!(
            calculate_delay(attempt, &options, None),
            Duration::from_millis(expected),
            "attempt {}",
            attempt
        );
    }
}

#[test]
fn test_retry_after_hint_overrides_backoff() {
    let options = RetryOptions::default();
    let err = SdkError::rate_limited("slow down", 20, None);
    for attempt in [0, 3, 9] {
        assert_eq!(
            calculate_delay(attempt, &options, Some(&err)),
            Duration::from_millis(20_100)
        );
    }
}

// =============================================================================
// Symbols and channels
// =============================================================================

#[test]
fn test_symbol_transform_round_trip() {
    for symbol in ["BTC/USDT", "ETH/BTC", "SOL/USD", "1INCH/EUR"] {
        assert_eq!(symbol_from_url(&symbol_to_url(symbol)), symbol);
    }
    for dashed in ["BTC-USDT", "DOGE-USD"] {
        assert_eq!(symbol_to_url(&symbol_from_url(dashed)), dashed);
    }
    assert_eq!(ticker_channel("binance", "BTC/USDT"), "ticker:binance:BTC-USDT");
    assert_eq!(exchange_ticker_channel("kraken"), "ticker:kraken");
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_stream_tickers_end_to_end() {
    let t = TestClient::new();
    let session = t
        .client
        .stream_tickers("binance", &["BTC/USDT"])
        .unwrap();
    let mut events = session.events();
    settle().await;

    let link = t.link();
    assert_eq!(link.url(), "wss://stream.test/v1");
    assert!(link
        .headers()
        .iter()
        .any(|(name, value)| name == "Authorization" && value == &format!("Bearer {}", API_KEY)));
    assert!(link.sent().is_empty(), "nothing is sent before the handshake");
    assert_eq!(session.state(), SessionState::Connecting);

    link.push_message(CONNECTED_MESSAGE);
    settle().await;
    assert!(session.is_connected());
    assert_eq!(session.server_info().unwrap().max_subscriptions, Some(100));

    let sent = link.sent_json();
    assert_eq!(
        sent,
        vec![json!({"type": "subscribe", "channels": ["ticker:binance:BTC-USDT"]})]
    );

    link.push_message(subscribed_message("ticker:binance:BTC-USDT"));
    link.push_message(TICKER_MESSAGE);
    link.push_message(PONG_MESSAGE);
    settle().await;

    assert_eq!(
        session.active_channels(),
        vec!["ticker:binance:BTC-USDT".to_string()]
    );

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(matches!(received[0], SessionEvent::Connected(_)));
    assert_eq!(
        received[1],
        SessionEvent::Subscribed("ticker:binance:BTC-USDT".into())
    );
    match &received[2] {
        SessionEvent::Ticker(update) => {
            assert_eq!(update.data.last, Some(dec!(64012.35)));
            assert_eq!(update.data.spread(), Some(dec!(0.10)));
        }
        other => panic!("expected ticker, got {:?}", other),
    }
    assert_eq!(received.len(), 3);

    session.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_stream_recovers_subscriptions_after_drop() {
    let t = TestClient::new();
    let session = t.client.streaming();
    let reconnects = Arc::new(Mutex::new(Vec::new()));
    let recorder = reconnects.clone();
    session.on_reconnecting(move |attempt, _| recorder.lock().unwrap().push(attempt));

    session.subscribe([ticker_channel("binance", "BTC/USDT")]);
    session.connect().unwrap();
    settle().await;
    t.link().push_message(CONNECTED_MESSAGE);
    settle().await;
    t.link()
        .push_message(subscribed_message("ticker:binance:BTC-USDT"));
    settle().await;

    t.link().push_close(1011, "server restart");
    settle().await;
    assert_eq!(session.state(), SessionState::Reconnecting);
    assert_eq!(*reconnects.lock().unwrap(), vec![1]);

    tokio::time::sleep(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(t.ws.connect_count(), 2);

    t.link().push_message(CONNECTED_MESSAGE);
    settle().await;
    assert_eq!(
        t.link().sent_json(),
        vec![json!({"type": "subscribe", "channels": ["ticker:binance:BTC-USDT"]})]
    );

    session.disconnect();
    session.disconnect();
    assert_eq!(session.state(), SessionState::Disconnected);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(t.ws.connect_count(), 2);
    assert_eq!(*reconnects.lock().unwrap(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_sessions_are_independent() {
    let t = TestClient::new();
    let first = t.client.streaming();
    let second = t.client.streaming();

    first.subscribe(["ticker:kraken"]);
    assert!(second.pending_channels().is_empty());

    first.connect().unwrap();
    second.connect().unwrap();
    settle().await;
    assert_eq!(t.ws.connect_count(), 2);

    first.disconnect();
    assert_eq!(second.state(), SessionState::Connecting);
    second.disconnect();
}

// =============================================================================
// Builder
// =============================================================================

#[test]
fn test_builder_rejects_bad_configuration() {
    assert_eq!(
        TickrClient::builder().with_api_key("").build().unwrap_err(),
        ConfigError::EmptyApiKey
    );
    assert!(matches!(
        TickrClient::builder().with_base_url("::").build(),
        Err(ConfigError::InvalidUrl { .. })
    ));
    assert!(matches!(
        TickrClient::builder().with_timeout(Duration::ZERO).build(),
        Err(ConfigError::ZeroTimeout { .. })
    ));
}

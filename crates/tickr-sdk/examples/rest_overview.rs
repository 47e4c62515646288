//! Example: Tour of the REST resources
//!
//! Lists exchanges and markets, fetches a ticker and a day of hourly candles,
//! then prints the remaining request quota.
//!
//! Run with: TICKR_API_KEY=... cargo run --example rest_overview

use tickr_sdk::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client = TickrClient::from_env()?;

    let health = client.health().await?;
    println!("Service status: {} ({:?})", health.status, health.version);

    let exchanges = client.exchanges().list().await?;
    println!("\n{} exchanges:", exchanges.len());
    for exchange in exchanges.iter().take(5) {
        println!("  {:<12} {}", exchange.id, exchange.name);
    }

    let markets = client
        .markets()
        .list("binance", &MarketQuery::new().quote("USDT").active(true).limit(10))
        .await?;
    println!("\nFirst {} active USDT markets on binance:", markets.len());
    for market in &markets {
        println!("  {}", market.symbol);
    }

    match client.tickers().get("binance", "BTC/USDT").await {
        Ok(ticker) => println!(
            "\nBTC/USDT last={:?} 24h change={:?}%",
            ticker.last, ticker.percentage
        ),
        Err(e) if e.code() == ErrorCode::NotFound => println!("\nBTC/USDT not listed"),
        Err(e) => return Err(e.into()),
    }

    let candles = client
        .history()
        .ohlcv("binance", "BTC/USDT", &OhlcvQuery::new(Timeframe::H1).limit(24))
        .await?;
    let bullish = candles.iter().filter(|c| c.is_bullish()).count();
    println!("\n{} of {} hourly candles closed up", bullish, candles.len());

    if let Some(quota) = client.rate_limit_info() {
        println!(
            "\nQuota: {}/{} requests left, resets at {}",
            quota.remaining, quota.limit, quota.reset
        );
        if let Some(daily) = quota.daily_remaining {
            println!("Daily quota left: {}", daily);
        }
    }

    Ok(())
}

//! Example: Stream live tickers
//!
//! Subscribes to BTC/USDT and ETH/USDT on Binance and prints every update for
//! 30 seconds. Reconnects automatically if the link drops.
//!
//! Run with: TICKR_API_KEY=... cargo run --example ticker_stream

use std::time::Duration;
use tickr_sdk::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tickr_ws=debug".into()),
        )
        .init();

    let client = TickrClient::from_env()?;
    let session = client.streaming();
    let mut events = session.events();

    session.subscribe([
        ticker_channel("binance", "BTC/USDT"),
        ticker_channel("binance", "ETH/USDT"),
    ]);
    session.connect()?;
    println!("Connecting to {} ...", client.streaming_config().url);

    let timeout = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            _ = &mut timeout => {
                println!("\nTimeout reached. Shutting down...");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(SessionEvent::Connected(info)) => {
                        println!("Connected (tier: {}, max subscriptions: {:?})", info.tier, info.max_subscriptions);
                    }
                    Some(SessionEvent::Subscribed(channel)) => println!("Subscribed to {}", channel),
                    Some(SessionEvent::Ticker(update)) => print_ticker(&update),
                    Some(SessionEvent::Reconnecting { attempt, delay }) => {
                        println!("Reconnecting (attempt {}) in {:?}", attempt, delay);
                    }
                    Some(SessionEvent::Error(err)) => eprintln!("Stream error: {}", err),
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    session.disconnect();
    Ok(())
}

fn print_ticker(update: &TickerUpdate) {
    let data = &update.data;
    println!(
        "{:>8} {:<10} last={:<12} bid={:<12} ask={:<12} spread={}",
        update.exchange,
        update.symbol,
        display(data.last),
        display(data.bid),
        display(data.ask),
        display(data.spread()),
    );
}

fn display(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

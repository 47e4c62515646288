//! Example: Retry behaviour and hooks
//!
//! Shows the backoff schedule, per-call retry overrides, and a hook that
//! observes every retry the client performs.
//!
//! Run with: TICKR_API_KEY=... cargo run --example retry_hooks

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickr_rest::calculate_delay;
use tickr_sdk::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Backoff schedule (no jitter) ===\n");
    let options = RetryOptions::default().with_jitter(false);
    for attempt in 0..6 {
        println!(
            "  retry {} waits {:?}",
            attempt + 1,
            calculate_delay(attempt, &options, None)
        );
    }
    let throttled = SdkError::rate_limited("Too Many Requests", 20, None);
    println!(
        "  after a 429 with Retry-After: 20 -> {:?}",
        calculate_delay(0, &options, Some(&throttled))
    );

    let retries = Arc::new(AtomicU32::new(0));
    let counter = retries.clone();
    let client = TickrClientBuilder::from_env()
        .with_retry(
            RetryOptions::default()
                .with_max_retries(4)
                .with_max_delay(Duration::from_secs(10)),
        )
        .on_retry(move |ctx| {
            counter.fetch_add(1, Ordering::Relaxed);
            println!(
                "  retry {}/{} after {} ({})",
                ctx.attempt,
                ctx.max_retries,
                ctx.error.code(),
                ctx.error.message()
            );
        })
        .build()?;

    println!("\n=== Client-level retries ===\n");
    match client.exchanges().list().await {
        Ok(exchanges) => println!("  fetched {} exchanges", exchanges.len()),
        Err(e) => report(&e),
    }

    println!("\n=== Per-call override: fail fast ===\n");
    let options = RequestOptions::new().with_retry(RetryOverrides::default().max_retries(0));
    match client
        .rest()
        .request::<Vec<Exchange>>("/exchanges", options)
        .await
    {
        Ok(exchanges) => println!("  fetched {} exchanges", exchanges.len()),
        Err(e) => report(&e),
    }

    println!("\nTotal retries observed: {}", retries.load(Ordering::Relaxed));
    Ok(())
}

fn report(err: &SdkError) {
    println!("  failed: {} [code={}, status={:?}]", err, err.code(), err.status());
    if err.is_rate_limit() {
        println!("  retry after {:?}", err.retry_after());
    }
    if let Some(id) = err.correlation_id() {
        println!("  correlation id: {}", id);
    }
}

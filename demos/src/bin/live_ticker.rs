//! Demo 1: Live Ticker
//!
//! Showcases: Ticker and kline subscriptions, one connection per stream
//!
//! Run: cargo run --bin live_ticker

use colored::*;
use pricefeed_ws::{MarketEvent, StreamConfig, SubscriptionRegistry};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  LIVE TICKER".cyan().bold());
    println!("{}", "  Pricefeed Demo - 24h Ticker and Hourly Candles".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let registry = SubscriptionRegistry::new(StreamConfig::default());

    registry.subscribe_ticker("btcusdt", |event| {
        if let MarketEvent::Ticker(t) = event {
            let change = if t.change_percent >= 0.0 {
                format!("{:+.2}%", t.change_percent).green()
            } else {
                format!("{:+.2}%", t.change_percent).red()
            };
            println!(
                "  {} {:<10} {:>12.2} {:>9}  vol {:>12.2}",
                format!("[{}]", chrono::Local::now().format("%H:%M:%S")).dimmed(),
                t.symbol.cyan(),
                t.price,
                change,
                t.volume
            );
        }
    })?;

    registry.subscribe_kline("ethusdt", "1h", |event| {
        if let MarketEvent::Kline(k) = event {
            let state = if k.is_closed { "CLOSED".yellow() } else { "open".dimmed() };
            println!(
                "  {} {:<10} O {:>9.2} H {:>9.2} L {:>9.2} C {:>9.2}  {}",
                format!("[{}]", chrono::Local::now().format("%H:%M:%S")).dimmed(),
                k.symbol.magenta(),
                k.open,
                k.high,
                k.low,
                k.close,
                state
            );
        }
    })?;

    for sub in registry.list_active() {
        println!("{} {} ({})", "✓".green(), sub.stream_name, sub.id);
    }
    println!();

    tokio::time::sleep(Duration::from_secs(30)).await;

    registry.shutdown().await;
    println!();
    println!("{}", "═".repeat(65).cyan());
    println!("  {}", "Subscriptions closed".white().bold());

    Ok(())
}

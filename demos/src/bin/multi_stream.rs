//! Demo 2: Multi-Stream Dashboard
//!
//! Showcases: Combined-stream subscriptions, depth snapshots, trade flow
//!
//! Run: cargo run --bin multi_stream

use colored::*;
use pricefeed_ws::{MarketEvent, StreamConfig, SubscriptionRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SYMBOLS: [&str; 3] = ["btcusdt", "ethusdt", "solusdt"];

#[derive(Default)]
struct Row {
    bid: Option<f64>,
    ask: Option<f64>,
    last: Option<f64>,
    trades: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "═".repeat(70).cyan());
    println!("{}", "  MULTI-STREAM DASHBOARD".cyan().bold());
    println!("{}", "  Pricefeed Demo - Combined Depth and Trade Streams".cyan());
    println!("{}", "═".repeat(70).cyan());
    println!();

    let rows: Arc<Mutex<HashMap<String, Row>>> = Arc::default();
    let registry = SubscriptionRegistry::new(StreamConfig::default());

    let tokens: Vec<String> = SYMBOLS
        .iter()
        .flat_map(|s| [format!("{}@depth5", s), format!("{}@trade", s)])
        .collect();

    let sink = Arc::clone(&rows);
    registry.subscribe_multiple(&tokens, move |event| {
        let mut rows = sink.lock().unwrap_or_else(|e| e.into_inner());
        let row = rows.entry(event.symbol().to_string()).or_default();
        match event {
            MarketEvent::Depth(book) => {
                row.bid = book.best_bid().map(|l| l.price);
                row.ask = book.best_ask().map(|l| l.price);
            }
            MarketEvent::Trade(trade) => {
                row.last = Some(trade.price);
                row.trades += 1;
            }
            _ => {}
        }
    })?;

    println!("{} One connection carrying {} streams\n", "✓".green(), tokens.len());

    println!(
        "  {:<10} {:>12} {:>12} {:>10} {:>12} {:>8}",
        "SYMBOL".white().bold(),
        "BID".white().bold(),
        "ASK".white().bold(),
        "SPREAD".white().bold(),
        "LAST".white().bold(),
        "TRADES".white().bold()
    );
    println!("  {}", "─".repeat(68));
    for _ in SYMBOLS {
        println!();
    }

    for _ in 0..60 {
        tokio::time::sleep(Duration::from_secs(1)).await;

        print!("\x1B[{}A", SYMBOLS.len());
        let rows = rows.lock().unwrap_or_else(|e| e.into_inner());

        for symbol in SYMBOLS {
            let key = symbol.to_uppercase();
            let fmt = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".into());

            match rows.get(&key) {
                Some(row) => {
                    let spread = match (row.bid, row.ask) {
                        (Some(bid), Some(ask)) => format!("{:.4}", ask - bid),
                        _ => "-".into(),
                    };
                    println!(
                        "  {:<10} {:>12} {:>12} {:>10} {:>12} {:>8}",
                        key.cyan(),
                        fmt(row.bid).green(),
                        fmt(row.ask).red(),
                        spread.yellow(),
                        fmt(row.last),
                        row.trades
                    );
                }
                None => println!("  {:<10} {:>12}", key.cyan(), "waiting...".dimmed()),
            }
        }
    }

    registry.shutdown().await;
    Ok(())
}

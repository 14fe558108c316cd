//! Demo 3: Auto-Reconnect Demo
//!
//! Showcases: Exponential backoff, retry ceiling, lifecycle events and hooks
//!
//! Run: cargo run --bin reconnect_demo

use colored::*;
use pricefeed_ws::{
    Endpoint, Hooks, LifecycleEvent, ReconnectPolicy, StreamConfig, SubscriptionRegistry,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  AUTO-RECONNECT DEMO".cyan().bold());
    println!("{}", "  Pricefeed Demo - Per-Subscription Recovery".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let policy = ReconnectPolicy::default();

    println!("{}", "  RECONNECTION POLICY".white().bold());
    println!("  {}", "─".repeat(50));
    println!("  Initial Delay:      {} ms", policy.initial_delay.as_millis().to_string().cyan());
    println!("  Backoff Multiplier: {}", format!("{}x", policy.multiplier).cyan());
    println!(
        "  Max Attempts:       {}",
        policy
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unlimited".into())
            .cyan()
    );
    println!();

    println!("{}", "  EXPONENTIAL BACKOFF PROGRESSION".white().bold());
    println!("  {}", "─".repeat(50));

    let mut retry = 0;
    while policy.should_retry(retry) {
        let delay = policy.next_delay(retry);
        let bar_len = (delay.as_millis() / 500).min(40) as usize;
        println!(
            "  Attempt {:>2}: {:>6} ms  {}",
            retry + 1,
            delay.as_millis(),
            "█".repeat(bar_len).yellow()
        );
        retry += 1;
    }
    println!("  Then: {}", "subscription marked dead".red());
    println!();

    println!("{}", "  UNREACHABLE ENDPOINT TEST".white().bold());
    println!("  {}", "─".repeat(50));

    let hooks = Hooks::new().on_dead(|id, stream| {
        println!("  {} {} ({}) feed unavailable", "✗".red(), stream.red(), id);
    });

    let config = StreamConfig::default()
        .with_endpoint(Endpoint::Custom("ws://127.0.0.1:9".into()))
        .with_timeout(Duration::from_secs(2))
        .with_reconnect(
            ReconnectPolicy::default()
                .with_initial_delay(Duration::from_millis(100))
                .with_max_attempts(4),
        );

    let registry = SubscriptionRegistry::new(config).with_hooks(hooks);
    let mut events = registry.take_event_receiver().ok_or("event receiver already taken")?;

    registry.subscribe_ticker("btcusdt", |_| {})?;

    while let Some(event) = events.recv().await {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");

        match &event {
            LifecycleEvent::Connected { .. } => {
                println!("  {} {} {}", format!("[{}]", timestamp).dimmed(), "●".green(), "Connected".green());
            }
            LifecycleEvent::Disconnected { reason, .. } => {
                println!(
                    "  {} {} Disconnected: {:?}",
                    format!("[{}]", timestamp).dimmed(),
                    "●".red(),
                    reason
                );
            }
            LifecycleEvent::Reconnecting { attempt, delay, .. } => {
                println!(
                    "  {} {} Reconnect attempt {} in {:?}",
                    format!("[{}]", timestamp).dimmed(),
                    "●".yellow(),
                    attempt,
                    delay
                );
            }
            LifecycleEvent::Dead { .. } | LifecycleEvent::Unsubscribed { .. } => break,
        }
    }

    println!();
    println!(
        "  {} Active subscriptions remaining: {}",
        "Note:".dimmed(),
        registry.list_active().len()
    );

    registry.shutdown().await;
    Ok(())
}

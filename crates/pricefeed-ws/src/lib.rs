//! Streaming market data subscriptions over WebSocket
//!
//! This crate keeps a set of independent stream subscriptions alive. Every
//! subscription owns one connection, reconnects on its own with exponential
//! backoff, and delivers normalized [`MarketEvent`]s to its callback.
//!
//! # Features
//!
//! - One connection and one task per subscription
//! - Automatic reconnection with exponential backoff and a retry ceiling
//! - Combined-stream subscriptions for several tokens on one connection
//! - Lifecycle events and hooks for surfacing "feed unavailable" states
//! - Optional staleness detection for silent connections
//!
//! # Example
//!
//! ```no_run
//! use pricefeed_ws::{LifecycleEvent, MarketEvent, StreamConfig, SubscriptionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SubscriptionRegistry::new(StreamConfig::default());
//!     let mut events = registry.take_event_receiver().unwrap();
//!
//!     registry.subscribe_kline("ethusdt", "1h", |event| {
//!         if let MarketEvent::Kline(k) = event {
//!             println!("{} close={} closed={}", k.symbol, k.close, k.is_closed);
//!         }
//!     })?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let LifecycleEvent::Dead { stream_name, .. } = event {
//!             eprintln!("{} unavailable", stream_name);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod events;
pub mod hooks;
pub mod reconnect;
pub mod registry;
pub mod transport;

// Re-export main types
pub use connection::{EventCallback, StreamConfig};
pub use events::{DisconnectReason, LifecycleEvent, StreamStatus, SubscriptionId};
pub use hooks::Hooks;
pub use reconnect::ReconnectPolicy;
pub use registry::{ActiveSubscription, SubscriptionRegistry};
pub use transport::{Connector, Transport, TransportError, WsConnector, WsTransport};

pub use pricefeed_types::{
    ChannelKind, DepthLevel, Endpoint, FeedError, FeedResult, KlineInterval, MarketEvent, StreamSpec,
};

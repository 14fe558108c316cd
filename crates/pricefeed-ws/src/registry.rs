//! Subscription registry
//!
//! The registry is the public surface of the crate: it validates subscribe
//! requests, allocates ids, hands each subscription to its own lifecycle
//! task, and answers introspection queries.
//!
//! # Example
//!
//! ```no_run
//! use pricefeed_ws::{MarketEvent, StreamConfig, SubscriptionRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SubscriptionRegistry::new(StreamConfig::default());
//!
//! let id = registry.subscribe_ticker("btcusdt", |event| {
//!     if let MarketEvent::Ticker(t) = event {
//!         println!("{} {}", t.symbol, t.price);
//!     }
//! })?;
//!
//! // ...
//! registry.unsubscribe(id);
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::connection::{EventCallback, Lifecycle, StreamConfig, SubscriptionMap, SubscriptionState};
use crate::events::{LifecycleEvent, StreamStatus, SubscriptionId};
use crate::hooks::Hooks;
use crate::transport::{Connector, WsConnector};

use parking_lot::Mutex;
use pricefeed_types::{
    resolve_batch, DepthLevel, FeedResult, KlineInterval, MarketEvent, ResolvedStream, StreamSpec,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on waiting for one task during [`SubscriptionRegistry::shutdown`]
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Snapshot of one live subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    /// Subscription id
    pub id: SubscriptionId,
    /// Stream name (`/`-joined for combined subscriptions)
    pub stream_name: String,
    /// Current connection status
    pub status: StreamStatus,
}

/// Registry of market data subscriptions
///
/// Every subscribe call owns an independent connection. Subscribe methods
/// spawn a task and must be called from within a Tokio runtime.
pub struct SubscriptionRegistry {
    config: Arc<StreamConfig>,
    connector: Arc<dyn Connector>,
    subscriptions: Arc<SubscriptionMap>,
    hooks: Hooks,
    event_tx: mpsc::UnboundedSender<LifecycleEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
}

impl SubscriptionRegistry {
    /// Create a registry connecting over real WebSockets
    pub fn new(config: StreamConfig) -> Self {
        let connector = WsConnector::new(config.connect_timeout);
        Self::with_connector(config, connector)
    }

    /// Create a registry with a custom transport factory
    pub fn with_connector(config: StreamConfig, connector: impl Connector) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            subscriptions: Arc::new(SubscriptionMap::new()),
            hooks: Hooks::default(),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Attach observability hooks
    ///
    /// Applies to subscriptions created after this call.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Take the lifecycle event receiver (can only be called once)
    pub fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<LifecycleEvent>> {
        self.event_rx.lock().take()
    }

    /// Subscribe to 24h rolling ticker updates
    pub fn subscribe_ticker<F>(&self, symbol: &str, callback: F) -> FeedResult<SubscriptionId>
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        self.subscribe(StreamSpec::ticker(symbol)?, callback)
    }

    /// Subscribe to candlesticks at `interval` (e.g. `"1m"`, `"1h"`, `"1d"`)
    pub fn subscribe_kline<F>(&self, symbol: &str, interval: &str, callback: F) -> FeedResult<SubscriptionId>
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        let interval: KlineInterval = interval.parse()?;
        self.subscribe(StreamSpec::kline(symbol, interval)?, callback)
    }

    /// Subscribe to individual trades
    pub fn subscribe_trade<F>(&self, symbol: &str, callback: F) -> FeedResult<SubscriptionId>
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        self.subscribe(StreamSpec::trade(symbol)?, callback)
    }

    /// Subscribe to top-of-book snapshots with `levels` levels (5, 10 or 20)
    pub fn subscribe_depth<F>(&self, symbol: &str, levels: u32, callback: F) -> FeedResult<SubscriptionId>
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        let level = DepthLevel::try_from(levels)?;
        self.subscribe(StreamSpec::depth(symbol, level)?, callback)
    }

    /// Subscribe to a single prepared stream
    pub fn subscribe<F>(&self, spec: StreamSpec, callback: F) -> FeedResult<SubscriptionId>
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        let stream = spec.resolve(&self.config.endpoint);
        Ok(self.open(stream, Arc::new(callback)))
    }

    /// Subscribe to several raw stream tokens over one combined connection
    ///
    /// Tokens look like `btcusdt@ticker`, `ethusdt@kline_1h` or
    /// `bnbusdt@depth10`. Every token is validated before anything connects.
    pub fn subscribe_multiple<I, S, F>(&self, tokens: I, callback: F) -> FeedResult<SubscriptionId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        let specs = tokens
            .into_iter()
            .map(|token| StreamSpec::parse(token.as_ref()))
            .collect::<FeedResult<Vec<_>>>()?;
        let stream = resolve_batch(&self.config.endpoint, &specs)?;
        Ok(self.open(stream, Arc::new(callback)))
    }

    fn open(&self, stream: ResolvedStream, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        info!(%id, "Subscribing to {}", stream.stream_name);

        let state = Arc::new(SubscriptionState::new(id, stream, callback));
        self.subscriptions.insert(id, Arc::clone(&state));

        Lifecycle {
            state,
            connector: Arc::clone(&self.connector),
            config: Arc::clone(&self.config),
            subscriptions: Arc::clone(&self.subscriptions),
            events: self.event_tx.clone(),
            hooks: self.hooks.clone(),
        }
        .spawn();

        id
    }

    /// Stop a subscription
    ///
    /// No callback fires for `id` once this returns; a callback already
    /// running on another thread is waited out. The record is dropped
    /// from the registry when its task has closed the transport. Returns
    /// false if `id` is unknown or already inactive.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some(state) = self.subscriptions.get(&id).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };

        if !state.close() {
            return false;
        }

        info!(%id, "Unsubscribed from {}", state.stream.stream_name);
        let _ = self.event_tx.send(LifecycleEvent::Unsubscribed { id });
        true
    }

    /// Stop every subscription, returning how many were active
    pub fn unsubscribe_all(&self) -> usize {
        let ids: Vec<SubscriptionId> = self.subscriptions.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter(|id| self.unsubscribe(*id)).count()
    }

    /// Stop every subscription and wait for their tasks to finish
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self
            .subscriptions
            .iter()
            .filter_map(|entry| entry.value().take_handle().map(|handle| (*entry.key(), handle)))
            .collect();

        let count = self.unsubscribe_all();
        info!("Shutting down {} subscription(s)", count);

        for (id, mut handle) in handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!(%id, "Lifecycle task did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                handle.abort();
            }
        }
    }

    /// Connection status of `id`
    pub fn status(&self, id: SubscriptionId) -> StreamStatus {
        self.subscriptions
            .get(&id)
            .map(|entry| entry.value().status())
            .unwrap_or(StreamStatus::Unknown)
    }

    /// Consecutive reconnect attempts since the last successful open
    pub fn retry_count(&self, id: SubscriptionId) -> Option<u32> {
        self.subscriptions.get(&id).map(|entry| entry.value().retry_count())
    }

    /// Snapshot of active subscriptions, ordered by id
    pub fn list_active(&self) -> Vec<ActiveSubscription> {
        let mut active: Vec<ActiveSubscription> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| {
                let state = entry.value();
                ActiveSubscription {
                    id: state.id,
                    stream_name: state.stream.stream_name.clone(),
                    status: state.status(),
                }
            })
            .collect();
        active.sort_by_key(|sub| sub.id);
        active
    }

    /// Number of tracked subscriptions, including ones still closing
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no subscriptions are tracked
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        let states: Vec<_> = self.subscriptions.iter().map(|entry| Arc::clone(entry.value())).collect();
        for state in states {
            state.close();
        }
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

//! Per-subscription connection lifecycle
//!
//! Each subscription owns exactly one task, and that task owns the
//! subscription's transport. The task drives an explicit state machine:
//!
//! ```text
//! Connecting --ok--> Connected --close/error/stale--> Closed
//!     |                                                  |
//!     +--connect failed--> Closed <----------------------+
//!                            |
//!          active && should_retry(retry_count)?
//!            yes: sleep next_delay(retry_count), retry_count += 1, Connecting
//!            no:  deactivate, emit Dead, leave the registry
//! ```
//!
//! Cancellation goes through the subscription's [`CancellationToken`], which
//! interrupts a pending connect, read, or backoff sleep.

use crate::events::{DisconnectReason, LifecycleEvent, StreamStatus, SubscriptionId};
use crate::hooks::Hooks;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{Connector, Transport, TransportError};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use pricefeed_types::{normalize_for_stream, Endpoint, MarketEvent, ResolvedStream};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Callback receiving normalized events for one subscription
pub type EventCallback = Arc<dyn Fn(MarketEvent) + Send + Sync>;

pub(crate) type SubscriptionMap = DashMap<SubscriptionId, Arc<SubscriptionState>>;

/// Configuration shared by every subscription of a registry
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Streaming endpoint
    pub endpoint: Endpoint,
    /// Reconnection settings
    pub reconnect: ReconnectPolicy,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Recycle a connection that has been silent this long
    pub stale_after: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Spot,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            stale_after: None,
        }
    }
}

impl StreamConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set reconnection policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Disable automatic reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectPolicy::disabled();
        self
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Treat a connection as dead when no frame arrives within `window`
    pub fn with_stale_after(mut self, window: Duration) -> Self {
        self.stale_after = Some(window);
        self
    }
}

/// State shared between the registry and a subscription's task
pub(crate) struct SubscriptionState {
    pub(crate) id: SubscriptionId,
    pub(crate) stream: ResolvedStream,
    callback: EventCallback,
    active: AtomicBool,
    retry_count: AtomicU32,
    status: RwLock<StreamStatus>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Held while the callback runs
    delivery: Mutex<()>,
}

impl SubscriptionState {
    pub(crate) fn new(id: SubscriptionId, stream: ResolvedStream, callback: EventCallback) -> Self {
        Self {
            id,
            stream,
            callback,
            active: AtomicBool::new(true),
            retry_count: AtomicU32::new(0),
            status: RwLock::new(StreamStatus::Connecting),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
            delivery: Mutex::new(()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Flip `active` to false; true only for the caller that flipped it
    fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn status(&self) -> StreamStatus {
        *self.status.read()
    }

    fn set_status(&self, status: StreamStatus) {
        *self.status.write() = status;
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Acquire)
    }

    pub(crate) fn set_handle(&self, handle: JoinHandle<()>) {
        *self.handle.lock() = Some(handle);
    }

    pub(crate) fn take_handle(&self) -> Option<JoinHandle<()>> {
        self.handle.lock().take()
    }

    /// Hand `event` to the callback unless the subscription is inactive
    pub(crate) fn deliver(&self, event: MarketEvent) -> bool {
        let _delivery = self.delivery.lock();
        if !self.is_active() {
            return false;
        }

        let _scope = CallbackScope::enter();
        (self.callback)(event);
        true
    }

    /// Stop the subscription: no callbacks and no reconnects after this returns
    ///
    /// A callback already running on another thread is waited out. Called
    /// from inside a callback, it returns without waiting.
    /// Returns false if the subscription was already inactive.
    pub(crate) fn close(&self) -> bool {
        if !self.deactivate() {
            return false;
        }
        self.set_status(StreamStatus::Closing);
        self.cancel.cancel();

        if !CallbackScope::is_inside() {
            drop(self.delivery.lock());
        }
        true
    }
}

thread_local! {
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a subscription callback
struct CallbackScope {
    outer: bool,
}

impl CallbackScope {
    fn enter() -> Self {
        Self {
            outer: IN_CALLBACK.with(|flag| flag.replace(true)),
        }
    }

    fn is_inside() -> bool {
        IN_CALLBACK.with(Cell::get)
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        IN_CALLBACK.with(|flag| flag.set(self.outer));
    }
}

/// How a single connection attempt ended
enum Attempt {
    Cancelled,
    Closed(DisconnectReason),
}

/// The task driving one subscription
pub(crate) struct Lifecycle {
    pub(crate) state: Arc<SubscriptionState>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) config: Arc<StreamConfig>,
    pub(crate) subscriptions: Arc<SubscriptionMap>,
    pub(crate) events: mpsc::UnboundedSender<LifecycleEvent>,
    pub(crate) hooks: Hooks,
}

impl Lifecycle {
    /// Spawn the task and attach its handle to the subscription
    pub(crate) fn spawn(self) {
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(self.run());
        state.set_handle(handle);
    }

    async fn run(self) {
        let id = self.state.id;
        debug!(%id, stream = %self.state.stream.stream_name, "Lifecycle task started");

        self.drive().await;

        self.state.set_status(StreamStatus::Closed);
        self.subscriptions.remove(&id);
        debug!(%id, "Lifecycle task finished");
    }

    async fn drive(&self) {
        let id = self.state.id;
        let policy = &self.config.reconnect;
        let mut has_connected = false;

        loop {
            if !self.state.is_active() {
                return;
            }

            self.state.set_status(StreamStatus::Connecting);
            let reason = match self.attempt(&mut has_connected).await {
                Attempt::Cancelled => return,
                Attempt::Closed(reason) => reason,
            };

            if !self.state.is_active() {
                return;
            }
            self.state.set_status(StreamStatus::Closed);
            self.hooks.invoke_disconnect(id, &reason);
            self.emit(LifecycleEvent::Disconnected { id, reason });

            let retry_count = self.state.retry_count();
            if !policy.should_retry(retry_count) {
                self.die(retry_count);
                return;
            }

            let delay = policy.delay_with_jitter(retry_count);
            let attempt = self.state.retry_count.fetch_add(1, Ordering::AcqRel) + 1;
            warn!(%id, "Reconnecting in {:?} (attempt {})", delay, attempt);
            self.hooks.invoke_reconnect_attempt(id, attempt, delay);
            self.emit(LifecycleEvent::Reconnecting { id, attempt, delay });

            tokio::select! {
                biased;
                _ = self.state.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection: open, read until it ends, close
    async fn attempt(&self, has_connected: &mut bool) -> Attempt {
        let id = self.state.id;
        let url = &self.state.stream.url;
        let mut transport = self.connector.transport(url);

        let window = self.config.connect_timeout;
        let connected = tokio::select! {
            biased;
            _ = self.state.cancel.cancelled() => return Attempt::Cancelled,
            result = timeout(window, transport.connect()) => {
                result.unwrap_or_else(|_| Err(TransportError::Timeout(window)))
            }
        };

        if let Err(e) = connected {
            warn!(%id, "Connection to {} failed: {}", url, e);
            return Attempt::Closed(DisconnectReason::ConnectFailed(e.to_string()));
        }

        if !self.state.is_active() {
            let _ = transport.close().await;
            return Attempt::Cancelled;
        }

        self.state.retry_count.store(0, Ordering::Release);
        self.state.set_status(StreamStatus::Connected);
        info!(%id, "Connected to {}", url);
        self.hooks.invoke_connect(id, *has_connected);
        self.emit(LifecycleEvent::Connected {
            id,
            is_reconnection: *has_connected,
        });
        *has_connected = true;

        let outcome = self.read_loop(transport.as_mut()).await;

        if let Err(e) = transport.close().await {
            debug!(%id, "Error closing transport: {}", e);
        }

        match outcome {
            Some(reason) => Attempt::Closed(reason),
            None => Attempt::Cancelled,
        }
    }

    /// Read frames until the connection ends; `None` means cancelled
    async fn read_loop(&self, transport: &mut dyn Transport) -> Option<DisconnectReason> {
        let id = self.state.id;

        loop {
            let received = tokio::select! {
                biased;
                _ = self.state.cancel.cancelled() => return None,
                received = recv_within(transport, self.config.stale_after) => received,
            };

            let Some(received) = received else {
                warn!(%id, "No frame within {:?}, recycling connection", self.config.stale_after);
                return Some(DisconnectReason::Stale);
            };

            match received {
                Ok(Some(text)) => self.dispatch(&text),
                Ok(None) => {
                    info!(%id, "Server closed connection");
                    return Some(DisconnectReason::ServerClosed);
                }
                Err(e) if !e.is_fatal() => {
                    warn!(%id, "Ignoring transport error: {}", e);
                }
                Err(e) => {
                    error!(%id, "WebSocket error: {}", e);
                    return Some(DisconnectReason::NetworkError(e.to_string()));
                }
            }
        }
    }

    fn dispatch(&self, raw: &str) {
        let id = self.state.id;
        self.hooks.invoke_message(id, raw.len());

        match normalize_for_stream(raw, Some(&self.state.stream.stream_name)) {
            Some(event) => {
                self.state.deliver(event);
            }
            None => {
                debug!(%id, "Dropped frame: {}", raw);
                self.hooks.invoke_dropped(id, raw);
            }
        }
    }

    fn die(&self, retry_count: u32) {
        let id = self.state.id;
        if !self.state.deactivate() {
            return;
        }

        let stream_name = self.state.stream.stream_name.clone();
        error!(%id, "Reconnection attempts exhausted after {} tries for {}", retry_count, stream_name);
        self.hooks.invoke_dead(id, &stream_name);
        self.emit(LifecycleEvent::Dead { id, stream_name });
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.events.send(event);
    }
}

async fn recv_within(
    transport: &mut dyn Transport,
    window: Option<Duration>,
) -> Option<Result<Option<String>, TransportError>> {
    match window {
        Some(window) => timeout(window, transport.recv()).await.ok(),
        None => Some(transport.recv().await),
    }
}

//! Observability hooks for subscription lifecycle monitoring
//!
//! Hooks observe the same transitions as the registry's event channel but
//! run synchronously inside the subscription's task. Useful for logging,
//! metrics, and flipping UI state without owning the event receiver.
//!
//! # Example
//!
//! ```
//! use pricefeed_ws::hooks::Hooks;
//!
//! let hooks = Hooks::new()
//!     .on_connect(|id, is_reconnection| {
//!         println!("{} connected (reconnection: {})", id, is_reconnection);
//!     })
//!     .on_reconnect_attempt(|id, attempt, delay| {
//!         println!("{} reconnecting (attempt {}), waiting {:?}", id, attempt, delay);
//!     })
//!     .on_dead(|id, stream| {
//!         eprintln!("{} ({}) is unavailable", id, stream);
//!     });
//! ```

use crate::events::{DisconnectReason, SubscriptionId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Type alias for hook callbacks
pub type ConnectHook = Arc<dyn Fn(SubscriptionId, bool) + Send + Sync>;
pub type DisconnectHook = Arc<dyn Fn(SubscriptionId, &DisconnectReason) + Send + Sync>;
pub type ReconnectAttemptHook = Arc<dyn Fn(SubscriptionId, u32, Duration) + Send + Sync>;
pub type DeadHook = Arc<dyn Fn(SubscriptionId, &str) + Send + Sync>;
pub type MessageHook = Arc<dyn Fn(SubscriptionId, usize) + Send + Sync>;
pub type DroppedHook = Arc<dyn Fn(SubscriptionId, &str) + Send + Sync>;

/// Observability hooks container
///
/// All hooks are optional. Keep hook callbacks fast to avoid stalling
/// the subscription's read loop.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) on_connect: Option<ConnectHook>,
    pub(crate) on_disconnect: Option<DisconnectHook>,
    pub(crate) on_reconnect_attempt: Option<ReconnectAttemptHook>,
    pub(crate) on_dead: Option<DeadHook>,
    pub(crate) on_message: Option<MessageHook>,
    pub(crate) on_dropped: Option<DroppedHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_connect", &self.on_connect.as_ref().map(|_| "..."))
            .field("on_disconnect", &self.on_disconnect.as_ref().map(|_| "..."))
            .field("on_reconnect_attempt", &self.on_reconnect_attempt.as_ref().map(|_| "..."))
            .field("on_dead", &self.on_dead.as_ref().map(|_| "..."))
            .field("on_message", &self.on_message.as_ref().map(|_| "..."))
            .field("on_dropped", &self.on_dropped.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Hooks {
    /// Create a new empty hooks container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for successful opens
    ///
    /// Called each time a connection opens, with `true` for reconnections.
    pub fn on_connect<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId, bool) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Register a callback for disconnections
    pub fn on_disconnect<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId, &DisconnectReason) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback for reconnection attempts
    ///
    /// Called with the attempt number (1-indexed) and the delay before it.
    pub fn on_reconnect_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId, u32, Duration) + Send + Sync + 'static,
    {
        self.on_reconnect_attempt = Some(Arc::new(f));
        self
    }

    /// Register a callback for permanently failed subscriptions
    pub fn on_dead<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId, &str) + Send + Sync + 'static,
    {
        self.on_dead = Some(Arc::new(f));
        self
    }

    /// Register a callback for received frames (with byte count)
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId, usize) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Register a callback for frames dropped by normalization
    pub fn on_dropped<F>(mut self, f: F) -> Self
    where
        F: Fn(SubscriptionId, &str) + Send + Sync + 'static,
    {
        self.on_dropped = Some(Arc::new(f));
        self
    }

    pub(crate) fn invoke_connect(&self, id: SubscriptionId, is_reconnection: bool) {
        if let Some(ref hook) = self.on_connect {
            hook(id, is_reconnection);
        }
    }

    pub(crate) fn invoke_disconnect(&self, id: SubscriptionId, reason: &DisconnectReason) {
        if let Some(ref hook) = self.on_disconnect {
            hook(id, reason);
        }
    }

    pub(crate) fn invoke_reconnect_attempt(&self, id: SubscriptionId, attempt: u32, delay: Duration) {
        if let Some(ref hook) = self.on_reconnect_attempt {
            hook(id, attempt, delay);
        }
    }

    pub(crate) fn invoke_dead(&self, id: SubscriptionId, stream_name: &str) {
        if let Some(ref hook) = self.on_dead {
            hook(id, stream_name);
        }
    }

    pub(crate) fn invoke_message(&self, id: SubscriptionId, size: usize) {
        if let Some(ref hook) = self.on_message {
            hook(id, size);
        }
    }

    pub(crate) fn invoke_dropped(&self, id: SubscriptionId, raw: &str) {
        if let Some(ref hook) = self.on_dropped {
            hook(id, raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_hooks_builder() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let hooks = Hooks::new().on_connect(move |_, _| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        hooks.invoke_connect(SubscriptionId(1), false);
        hooks.invoke_connect(SubscriptionId(1), true);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hooks_clone() {
        let hooks = Hooks::new().on_connect(|_, _| {}).on_dead(|_, _| {});

        let cloned = hooks.clone();
        assert!(cloned.on_connect.is_some());
        assert!(cloned.on_dead.is_some());
        assert!(cloned.on_disconnect.is_none());
    }

    #[test]
    fn test_hooks_default() {
        let hooks = Hooks::default();
        // Empty hooks are no-ops
        hooks.invoke_dead(SubscriptionId(0), "btcusdt@ticker");
        hooks.invoke_message(SubscriptionId(0), 10);
    }
}

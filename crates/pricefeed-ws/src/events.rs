//! Subscription lifecycle events
//!
//! Market data goes to each subscription's callback. Lifecycle transitions
//! are published separately on the registry's event channel so UI layers
//! can surface "reconnecting" or "feed unavailable" states.

use std::fmt;
use std::time::Duration;

/// Opaque handle identifying one subscription
///
/// Allocated from a process-wide counter; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Readiness of a subscription's underlying connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    /// Connection attempt in progress
    Connecting,
    /// Connected and receiving frames
    Connected,
    /// Close requested, transport shutting down
    Closing,
    /// No live connection (also while waiting out a reconnect delay)
    Closed,
    /// Id is not tracked by the registry
    Unknown,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Connection attempt failed
    ConnectFailed(String),
    /// Network error while reading
    NetworkError(String),
    /// No frame received within the staleness window
    Stale,
}

/// Lifecycle events for one subscription
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Connection opened; retry counter reset
    Connected {
        /// Subscription
        id: SubscriptionId,
        /// Whether this follows an earlier disconnect
        is_reconnection: bool,
    },
    /// Connection lost
    Disconnected {
        /// Subscription
        id: SubscriptionId,
        /// Why
        reason: DisconnectReason,
    },
    /// Reconnect scheduled
    Reconnecting {
        /// Subscription
        id: SubscriptionId,
        /// Attempt number (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Retries exhausted; subscription removed from the registry
    Dead {
        /// Subscription
        id: SubscriptionId,
        /// Stream the subscription carried
        stream_name: String,
    },
    /// Caller unsubscribed
    Unsubscribed {
        /// Subscription
        id: SubscriptionId,
    },
}

impl LifecycleEvent {
    /// Subscription the event belongs to
    pub fn id(&self) -> SubscriptionId {
        match self {
            Self::Connected { id, .. }
            | Self::Disconnected { id, .. }
            | Self::Reconnecting { id, .. }
            | Self::Dead { id, .. }
            | Self::Unsubscribed { id } => *id,
        }
    }

    /// Whether the subscription will produce no further events
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Dead { .. } | Self::Unsubscribed { .. })
    }
}

//! Reconnection policy with exponential backoff

use std::time::Duration;

/// Backoff and retry ceiling applied to each subscription independently
///
/// `retry_count` is the number of consecutive reconnect attempts since the
/// last successful open, starting at 0.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each attempt)
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0); 0.0 keeps delays deterministic
    pub jitter: f64,
    /// Maximum number of consecutive reconnection attempts (None = unlimited)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts: Some(5),
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set jitter factor
    ///
    /// Spreads reconnects out when many subscriptions drop at once.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Set maximum attempts
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Retry forever
    pub fn unlimited(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Disable reconnection
    pub fn disabled() -> Self {
        Self {
            max_attempts: Some(0),
            ..Default::default()
        }
    }

    /// Delay before reconnect attempt number `retry_count` (0-indexed)
    ///
    /// `initial_delay * multiplier^retry_count`, capped at `max_delay`.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;

        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }

    /// Apply jitter to a base delay
    pub fn apply_jitter(&self, base: Duration) -> Duration {
        if self.jitter == 0.0 {
            return base;
        }

        let jitter_range = base.as_millis() as f64 * self.jitter;
        let jitter = rand::random::<f64>() * 2.0 * jitter_range - jitter_range;
        let adjusted_ms = (base.as_millis() as f64 + jitter).max(0.0) as u64;

        Duration::from_millis(adjusted_ms)
    }

    /// Get delay with jitter applied for a given retry count
    pub fn delay_with_jitter(&self, retry_count: u32) -> Duration {
        self.apply_jitter(self.next_delay(retry_count))
    }

    /// Whether another attempt is allowed after `retry_count` attempts
    pub fn should_retry(&self, retry_count: u32) -> bool {
        match self.max_attempts {
            Some(max) => retry_count < max,
            None => true,
        }
    }
}

//! Error types for stream resolution

use thiserror::Error;

/// Errors raised while resolving a subscription request
///
/// These are caller misuse errors: they surface synchronously from the
/// `subscribe_*` operations and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Channel is not one of ticker, kline, trade, depth
    #[error("invalid channel: {channel} (supported: ticker, kline, trade, depth)")]
    InvalidChannel { channel: String },

    /// Symbol is empty or contains characters not allowed in a stream token
    #[error("invalid symbol: {symbol:?}")]
    InvalidSymbol { symbol: String },

    /// Kline interval not supported by the feed
    #[error("invalid kline interval: {interval} (supported: 1s, 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1M)")]
    InvalidInterval { interval: String },

    /// Depth level not supported by the feed
    #[error("invalid depth level: {level} (supported: 5, 10, 20)")]
    InvalidDepthLevel { level: u32 },

    /// Raw stream token could not be parsed
    #[error("invalid stream token: {token}")]
    InvalidStreamToken { token: String },

    /// Batched subscription with no streams
    #[error("at least one stream must be specified")]
    EmptyBatch,
}

impl FeedError {
    /// Create an invalid channel error
    pub fn invalid_channel(channel: impl Into<String>) -> Self {
        Self::InvalidChannel {
            channel: channel.into(),
        }
    }

    /// Create an invalid symbol error
    pub fn invalid_symbol(symbol: impl Into<String>) -> Self {
        Self::InvalidSymbol {
            symbol: symbol.into(),
        }
    }

    /// Returns true for errors caused by the shape of the request
    /// rather than by one of its parameter values
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, Self::InvalidStreamToken { .. } | Self::EmptyBatch)
    }
}

/// Result type alias for stream resolution
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FeedError::invalid_channel("bookTicker");
        assert!(err.to_string().contains("bookTicker"));

        let err = FeedError::InvalidDepthLevel { level: 50 };
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_malformed_request() {
        assert!(FeedError::EmptyBatch.is_malformed_request());
        assert!(!FeedError::invalid_symbol("").is_malformed_request());
    }
}

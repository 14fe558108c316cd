//! Streaming endpoint definitions

use std::fmt;

/// Market data streaming endpoints
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Production spot streams (default)
    #[default]
    Spot,
    /// Spot testnet streams
    Testnet,
    /// Any other base URL speaking the same protocol (relays, local mocks)
    Custom(String),
}

impl Endpoint {
    /// Get the base WebSocket URL for this endpoint, without a trailing slash
    pub fn base_url(&self) -> &str {
        match self {
            Self::Spot => "wss://stream.binance.com:9443",
            Self::Testnet => "wss://testnet.binance.vision",
            Self::Custom(url) => url.trim_end_matches('/'),
        }
    }

    /// URL of a raw single-stream connection
    pub fn single_stream_url(&self, token: &str) -> String {
        format!("{}/ws/{}", self.base_url(), token)
    }

    /// URL of a combined-stream connection
    ///
    /// Frames on combined connections arrive wrapped as
    /// `{"stream": "<token>", "data": {...}}`.
    pub fn combined_stream_url(&self, tokens: &str) -> String {
        format!("{}/stream?streams={}", self.base_url(), tokens)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_url())
    }
}

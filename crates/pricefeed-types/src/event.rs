//! Normalized market events
//!
//! Every wire message that survives normalization becomes one of these.
//! Prices and quantities are `f64` and guaranteed finite; timestamps are
//! milliseconds since the Unix epoch.

use crate::channel::ChannelKind;
use serde::Serialize;

/// Normalized market data event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MarketEvent {
    /// 24h rolling ticker update
    Ticker(Ticker),
    /// Candlestick update
    Kline(Kline),
    /// Executed trade
    Trade(Trade),
    /// Orderbook depth snapshot or diff
    Depth(DepthSnapshot),
}

impl MarketEvent {
    /// Uppercase trading pair symbol
    pub fn symbol(&self) -> &str {
        match self {
            Self::Ticker(t) => &t.symbol,
            Self::Kline(k) => &k.symbol,
            Self::Trade(t) => &t.symbol,
            Self::Depth(d) => &d.symbol,
        }
    }

    /// Channel the event was produced by
    pub fn channel(&self) -> ChannelKind {
        match self {
            Self::Ticker(_) => ChannelKind::Ticker,
            Self::Kline(_) => ChannelKind::Kline,
            Self::Trade(_) => ChannelKind::Trade,
            Self::Depth(_) => ChannelKind::Depth,
        }
    }
}

/// Ticker data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    /// Trading pair symbol
    pub symbol: String,
    /// Last traded price
    pub price: f64,
    /// Absolute 24h price change
    pub change: f64,
    /// 24h price change percentage
    pub change_percent: f64,
    /// Price 24h ago
    pub open: f64,
    /// 24h high
    pub high: f64,
    /// 24h low
    pub low: f64,
    /// 24h base asset volume
    pub volume: f64,
    /// 24h quote asset volume
    pub quote_volume: f64,
    /// Best bid, when the feed includes it
    pub bid: Option<f64>,
    /// Best ask, when the feed includes it
    pub ask: Option<f64>,
    /// Event time (ms)
    pub timestamp: u64,
}

/// Candlestick data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kline {
    /// Trading pair symbol
    pub symbol: String,
    /// Interval code (e.g. "1h")
    pub interval: String,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Base asset volume
    pub volume: f64,
    /// Candle open time (ms)
    pub open_time: u64,
    /// Candle close time (ms)
    pub close_time: u64,
    /// Number of trades in the candle
    pub trades: u64,
    /// Whether this candle is final
    pub is_closed: bool,
}

/// Trade data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    /// Trading pair symbol
    pub symbol: String,
    /// Unique trade ID
    pub trade_id: u64,
    /// Trade price
    pub price: f64,
    /// Trade quantity
    pub quantity: f64,
    /// Trade time (ms)
    pub timestamp: u64,
    /// Whether the buyer was the maker (i.e. the aggressor sold)
    pub is_buyer_maker: bool,
}

/// A single price level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    /// Price of this level
    pub price: f64,
    /// Quantity at this level
    pub quantity: f64,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    /// Notional value of this level
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Orderbook depth
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthSnapshot {
    /// Trading pair symbol (uppercase; derived from the stream name when the payload omits it)
    pub symbol: String,
    /// Monotonically increasing book update ID
    pub last_update_id: u64,
    /// Bid levels, best first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first
    pub asks: Vec<PriceLevel>,
}

impl DepthSnapshot {
    /// Best (highest) bid
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Best (lowest) ask
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Spread between best ask and best bid
    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagged_serialization() {
        let event = MarketEvent::Trade(Trade {
            symbol: "BTCUSDT".into(),
            trade_id: 7,
            price: 50000.0,
            quantity: 0.5,
            timestamp: 1_700_000_000_000,
            is_buyer_maker: false,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "trade");
        assert_eq!(json["symbol"], "BTCUSDT");
        assert_eq!(event.channel(), ChannelKind::Trade);
    }

    #[test]
    fn test_depth_spread() {
        let depth = DepthSnapshot {
            symbol: "BTCUSDT".into(),
            last_update_id: 1,
            bids: vec![PriceLevel::new(99.0, 1.0)],
            asks: vec![PriceLevel::new(101.0, 2.0)],
        };
        assert_eq!(depth.spread(), Some(2.0));
        assert_eq!(depth.best_ask().map(PriceLevel::notional), Some(202.0));

        let empty = DepthSnapshot {
            bids: vec![],
            ..depth
        };
        assert_eq!(empty.spread(), None);
    }
}

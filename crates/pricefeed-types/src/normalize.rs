//! Raw frame normalization
//!
//! Maps the feed's wire shapes onto [`MarketEvent`]. Dispatch is on the
//! `"e"` event-type tag: `24hrTicker`, `kline`, `trade` and `depthUpdate`.
//! Partial depth snapshots carry no tag and are recognized by their
//! `lastUpdateId` field. Combined-stream envelopes
//! (`{"stream": ..., "data": ...}`) are unwrapped first.
//!
//! Numeric fields arrive as JSON strings (`"50000.01"`) or numbers. A frame
//! with any required field missing, non-numeric or non-finite is dropped
//! as a whole; callers never see a partially populated event.

use crate::event::{DepthSnapshot, Kline, MarketEvent, PriceLevel, Ticker, Trade};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Normalize a raw text frame
///
/// Returns `None` for frames that are not JSON, have an unsupported shape,
/// or fail numeric validation.
///
/// # Example
///
/// ```
/// use pricefeed_types::{normalize, MarketEvent};
///
/// let raw = r#"{"e":"trade","E":1700000000001,"s":"BTCUSDT","t":12345,
///               "p":"50000.10","q":"0.25","T":1700000000000,"m":true}"#;
///
/// match normalize(raw) {
///     Some(MarketEvent::Trade(trade)) => assert_eq!(trade.price, 50000.10),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
pub fn normalize(raw: &str) -> Option<MarketEvent> {
    normalize_for_stream(raw, None)
}

/// Normalize a raw text frame received on `stream`
///
/// The stream name is only consulted for payloads that do not carry their
/// own symbol (partial depth snapshots on a single-stream connection).
pub fn normalize_for_stream(raw: &str, stream: Option<&str>) -> Option<MarketEvent> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            debug!("Dropping non-JSON frame: {}", e);
            return None;
        }
    };
    normalize_value(&value, stream)
}

/// Normalize an already parsed JSON value
pub fn normalize_value(value: &Value, stream: Option<&str>) -> Option<MarketEvent> {
    if let (Some(data), Some(name)) = (value.get("data"), value.get("stream").and_then(Value::as_str)) {
        return normalize_payload(data, Some(name));
    }
    normalize_payload(value, stream)
}

fn normalize_payload(value: &Value, stream: Option<&str>) -> Option<MarketEvent> {
    let event = match value.get("e").and_then(Value::as_str) {
        Some("24hrTicker") => decode::<RawTicker>(value).map(|raw| MarketEvent::Ticker(raw.into())),
        Some("kline") => decode::<RawKline>(value)
            .and_then(RawKline::into_kline)
            .map(MarketEvent::Kline),
        Some("trade") => decode::<RawTrade>(value)
            .and_then(RawTrade::into_trade)
            .map(MarketEvent::Trade),
        Some("depthUpdate") => decode::<RawDepthUpdate>(value)
            .and_then(|raw| raw.into_depth(stream))
            .map(MarketEvent::Depth),
        Some(other) => {
            debug!("Ignoring unsupported event type: {}", other);
            return None;
        }
        None if value.get("lastUpdateId").is_some() => decode::<RawDepthSnapshot>(value)
            .and_then(|raw| raw.into_depth(stream))
            .map(MarketEvent::Depth),
        None => {
            debug!("Ignoring frame without event type");
            return None;
        }
    };

    if event.is_none() {
        debug!("Dropping malformed frame: {}", value);
    }
    event
}

fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    T::deserialize(value)
        .map_err(|e| debug!("Wire decode failed: {}", e))
        .ok()
}

/// `24hrTicker` payload
#[derive(Deserialize)]
struct RawTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c", deserialize_with = "finite")]
    price: f64,
    #[serde(rename = "p", deserialize_with = "finite")]
    change: f64,
    #[serde(rename = "P", deserialize_with = "finite")]
    change_percent: f64,
    #[serde(rename = "o", deserialize_with = "finite")]
    open: f64,
    #[serde(rename = "h", deserialize_with = "finite")]
    high: f64,
    #[serde(rename = "l", deserialize_with = "finite")]
    low: f64,
    #[serde(rename = "v", deserialize_with = "finite")]
    volume: f64,
    #[serde(rename = "q", deserialize_with = "finite")]
    quote_volume: f64,
    #[serde(rename = "b", default, deserialize_with = "optional_finite")]
    bid: Option<f64>,
    #[serde(rename = "a", default, deserialize_with = "optional_finite")]
    ask: Option<f64>,
    #[serde(rename = "E")]
    event_time: u64,
}

impl From<RawTicker> for Ticker {
    fn from(raw: RawTicker) -> Self {
        Self {
            symbol: raw.symbol,
            price: raw.price,
            change: raw.change,
            change_percent: raw.change_percent,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            volume: raw.volume,
            quote_volume: raw.quote_volume,
            bid: raw.bid,
            ask: raw.ask,
            timestamp: raw.event_time,
        }
    }
}

/// `kline` payload; the candle itself is nested under `k`
#[derive(Deserialize)]
struct RawKline {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "k")]
    candle: RawCandle,
}

#[derive(Deserialize)]
struct RawCandle {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o", deserialize_with = "finite")]
    open: f64,
    #[serde(rename = "h", deserialize_with = "finite")]
    high: f64,
    #[serde(rename = "l", deserialize_with = "finite")]
    low: f64,
    #[serde(rename = "c", deserialize_with = "finite")]
    close: f64,
    #[serde(rename = "v", deserialize_with = "finite")]
    volume: f64,
    #[serde(rename = "t")]
    open_time: u64,
    #[serde(rename = "T")]
    close_time: u64,
    #[serde(rename = "n")]
    trades: u64,
    #[serde(rename = "x")]
    is_closed: bool,
}

impl RawKline {
    fn into_kline(self) -> Option<Kline> {
        let k = self.candle;
        Some(Kline {
            symbol: self.symbol.or(k.symbol)?,
            interval: k.interval,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            volume: k.volume,
            open_time: k.open_time,
            close_time: k.close_time,
            trades: k.trades,
            is_closed: k.is_closed,
        })
    }
}

/// `trade` payload
#[derive(Deserialize)]
struct RawTrade {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "t")]
    trade_id: u64,
    #[serde(rename = "p", deserialize_with = "finite")]
    price: f64,
    #[serde(rename = "q", deserialize_with = "finite")]
    quantity: f64,
    #[serde(rename = "T")]
    trade_time: Option<u64>,
    #[serde(rename = "E")]
    event_time: Option<u64>,
    #[serde(rename = "m")]
    is_buyer_maker: bool,
}

impl RawTrade {
    fn into_trade(self) -> Option<Trade> {
        Some(Trade {
            symbol: self.symbol,
            trade_id: self.trade_id,
            price: self.price,
            quantity: self.quantity,
            timestamp: self.trade_time.or(self.event_time)?,
            is_buyer_maker: self.is_buyer_maker,
        })
    }
}

/// `[price, quantity]` pair
#[derive(Deserialize)]
struct RawLevel(
    #[serde(deserialize_with = "finite")] f64,
    #[serde(deserialize_with = "finite")] f64,
);

impl From<RawLevel> for PriceLevel {
    fn from(RawLevel(price, quantity): RawLevel) -> Self {
        Self { price, quantity }
    }
}

/// Untagged partial book snapshot
#[derive(Deserialize)]
struct RawDepthSnapshot {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

impl RawDepthSnapshot {
    fn into_depth(self, stream: Option<&str>) -> Option<DepthSnapshot> {
        Some(DepthSnapshot {
            symbol: self.symbol.or_else(|| symbol_from_stream(stream))?,
            last_update_id: self.last_update_id,
            bids: self.bids.into_iter().map(PriceLevel::from).collect(),
            asks: self.asks.into_iter().map(PriceLevel::from).collect(),
        })
    }
}

/// `depthUpdate` diff
#[derive(Deserialize)]
struct RawDepthUpdate {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "u")]
    last_update_id: u64,
    #[serde(rename = "b")]
    bids: Vec<RawLevel>,
    #[serde(rename = "a")]
    asks: Vec<RawLevel>,
}

impl RawDepthUpdate {
    fn into_depth(self, stream: Option<&str>) -> Option<DepthSnapshot> {
        RawDepthSnapshot {
            symbol: self.symbol,
            last_update_id: self.last_update_id,
            bids: self.bids,
            asks: self.asks,
        }
        .into_depth(stream)
    }
}

/// `btcusdt@depth20` or `btcusdt@depth20/ethusdt@trade` -> `BTCUSDT`
fn symbol_from_stream(stream: Option<&str>) -> Option<String> {
    let (symbol, _) = stream?.split('/').next()?.split_once('@')?;
    (!symbol.is_empty()).then(|| symbol.to_ascii_uppercase())
}

/// Numbers arrive as JSON strings or numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_finite<E: de::Error>(self) -> Result<f64, E> {
        let parsed = match self {
            Self::String(s) => s.trim().parse::<f64>().map_err(E::custom)?,
            Self::Number(n) => n.as_f64().ok_or_else(|| E::custom("invalid number"))?,
        };
        if parsed.is_finite() {
            Ok(parsed)
        } else {
            Err(E::custom(format!("non-finite number: {}", parsed)))
        }
    }
}

fn finite<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer)?.into_finite()
}

/// Absent or `null` is `None`; present but invalid fails the whole frame
fn optional_finite<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer)?
        .map(StringOrNumber::into_finite)
        .transpose()
}

//! Stream token and connection URL resolution
//!
//! Streams are addressed as `<symbol>@<channel>[_<param>]` tokens, e.g.
//! `btcusdt@ticker`, `ethusdt@kline_1h`, `btcusdt@depth20`. Batched
//! subscriptions join several tokens with `/` onto one combined connection.
//!
//! # Example
//!
//! ```
//! use pricefeed_types::{resolve_stream, StreamSpec, KlineInterval, Endpoint};
//!
//! let resolved = resolve_stream("kline", "ETHUSDT", Some("1h")).unwrap();
//! assert_eq!(resolved.stream_name, "ethusdt@kline_1h");
//! assert_eq!(resolved.url, "wss://stream.binance.com:9443/ws/ethusdt@kline_1h");
//!
//! let spec = StreamSpec::kline("ethusdt", KlineInterval::H1).unwrap();
//! assert_eq!(spec.resolve(&Endpoint::Spot).stream_name, "ethusdt@kline_1h");
//! ```

use crate::channel::{ChannelKind, DepthLevel, KlineInterval};
use crate::endpoint::Endpoint;
use crate::error::{FeedError, FeedResult};
use std::fmt;
use std::str::FromStr;

/// Channel plus its channel-specific parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// 24h rolling ticker
    Ticker,
    /// Candlesticks at the given interval
    Kline(KlineInterval),
    /// Raw trades
    Trade,
    /// Partial book depth with the given number of levels
    Depth(DepthLevel),
}

impl StreamKind {
    /// The channel this stream belongs to
    pub fn channel(&self) -> ChannelKind {
        match self {
            Self::Ticker => ChannelKind::Ticker,
            Self::Kline(_) => ChannelKind::Kline,
            Self::Trade => ChannelKind::Trade,
            Self::Depth(_) => ChannelKind::Depth,
        }
    }
}

/// One logical stream: a symbol on a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamSpec {
    symbol: String,
    kind: StreamKind,
}

impl StreamSpec {
    /// Create a spec from a validated symbol and kind
    pub fn new(symbol: &str, kind: StreamKind) -> FeedResult<Self> {
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            kind,
        })
    }

    /// Ticker stream for `symbol`
    pub fn ticker(symbol: &str) -> FeedResult<Self> {
        Self::new(symbol, StreamKind::Ticker)
    }

    /// Kline stream for `symbol` at `interval`
    pub fn kline(symbol: &str, interval: KlineInterval) -> FeedResult<Self> {
        Self::new(symbol, StreamKind::Kline(interval))
    }

    /// Trade stream for `symbol`
    pub fn trade(symbol: &str) -> FeedResult<Self> {
        Self::new(symbol, StreamKind::Trade)
    }

    /// Partial depth stream for `symbol` with `level` levels per side
    pub fn depth(symbol: &str, level: DepthLevel) -> FeedResult<Self> {
        Self::new(symbol, StreamKind::Depth(level))
    }

    /// Build a spec from loosely typed parts
    ///
    /// `param` is the kline interval code for `kline` and the level count
    /// for `depth`; it is ignored for `ticker` and `trade`. Missing params
    /// fall back to [`KlineInterval::default`] and [`DepthLevel::default`].
    pub fn from_parts(channel: &str, symbol: &str, param: Option<&str>) -> FeedResult<Self> {
        let channel: ChannelKind = channel.parse()?;
        let kind = match channel {
            ChannelKind::Ticker => StreamKind::Ticker,
            ChannelKind::Trade => StreamKind::Trade,
            ChannelKind::Kline => StreamKind::Kline(
                param
                    .map(KlineInterval::from_str)
                    .transpose()?
                    .unwrap_or_default(),
            ),
            ChannelKind::Depth => StreamKind::Depth(
                param
                    .map(DepthLevel::from_str)
                    .transpose()?
                    .unwrap_or_default(),
            ),
        };
        Self::new(symbol, kind)
    }

    /// Parse a raw stream token such as `btcusdt@kline_1h`
    pub fn parse(token: &str) -> FeedResult<Self> {
        let token = token.trim();
        let (symbol, rest) = token
            .split_once('@')
            .ok_or_else(|| FeedError::InvalidStreamToken {
                token: token.to_string(),
            })?;

        if let Some(interval) = rest.strip_prefix("kline_") {
            return Self::from_parts("kline", symbol, Some(interval));
        }
        if let Some(level) = rest.strip_prefix("depth") {
            let level = (!level.is_empty()).then_some(level);
            return Self::from_parts("depth", symbol, level);
        }
        Self::from_parts(rest, symbol, None)
    }

    /// Lowercase symbol as used in the token
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Stream kind and parameter
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Channel of this stream
    pub fn channel(&self) -> ChannelKind {
        self.kind.channel()
    }

    /// Canonical stream token
    pub fn token(&self) -> String {
        match self.kind {
            StreamKind::Ticker => format!("{}@ticker", self.symbol),
            StreamKind::Kline(interval) => format!("{}@kline_{}", self.symbol, interval.as_str()),
            StreamKind::Trade => format!("{}@trade", self.symbol),
            StreamKind::Depth(level) => format!("{}@depth{}", self.symbol, level.as_u32()),
        }
    }

    /// Resolve to a single-stream connection on `endpoint`
    pub fn resolve(&self, endpoint: &Endpoint) -> ResolvedStream {
        let stream_name = self.token();
        ResolvedStream {
            url: endpoint.single_stream_url(&stream_name),
            stream_name,
            specs: vec![self.clone()],
            combined: false,
        }
    }
}

impl FromStr for StreamSpec {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// A stream token together with the URL to connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    /// Canonical stream name (`/`-joined for combined connections)
    pub stream_name: String,
    /// Fully qualified connection URL
    pub url: String,
    /// Logical streams carried by this connection
    pub specs: Vec<StreamSpec>,
    /// Whether frames arrive in the combined-stream envelope
    pub combined: bool,
}

/// Resolve a stream against the default endpoint
///
/// # Errors
///
/// - [`FeedError::InvalidChannel`] if `channel` is not ticker, kline, trade or depth
/// - [`FeedError::InvalidSymbol`] if `symbol` is empty
/// - [`FeedError::InvalidInterval`] / [`FeedError::InvalidDepthLevel`] for bad params
pub fn resolve_stream(channel: &str, symbol: &str, param: Option<&str>) -> FeedResult<ResolvedStream> {
    Ok(StreamSpec::from_parts(channel, symbol, param)?.resolve(&Endpoint::default()))
}

/// Resolve several streams onto one combined connection
pub fn resolve_batch(endpoint: &Endpoint, specs: &[StreamSpec]) -> FeedResult<ResolvedStream> {
    if specs.is_empty() {
        return Err(FeedError::EmptyBatch);
    }

    let stream_name = specs
        .iter()
        .map(StreamSpec::token)
        .collect::<Vec<_>>()
        .join("/");

    Ok(ResolvedStream {
        url: endpoint.combined_stream_url(&stream_name),
        stream_name,
        specs: specs.to_vec(),
        combined: true,
    })
}

fn normalize_symbol(symbol: &str) -> FeedResult<String> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FeedError::invalid_symbol(symbol));
    }
    Ok(trimmed.to_ascii_lowercase())
}

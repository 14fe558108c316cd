//! Channel, kline interval and depth level enums

use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stream channel types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Rolling 24h ticker statistics
    Ticker,
    /// Candlestick updates
    Kline,
    /// Individual trades
    Trade,
    /// Partial orderbook depth
    Depth,
}

impl ChannelKind {
    /// All supported channels
    pub const ALL: [ChannelKind; 4] = [Self::Ticker, Self::Kline, Self::Trade, Self::Depth];

    /// Returns the channel name as used in stream tokens
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Kline => "kline",
            Self::Trade => "trade",
            Self::Depth => "depth",
        }
    }
}

impl FromStr for ChannelKind {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ticker" => Ok(Self::Ticker),
            "kline" => Ok(Self::Kline),
            "trade" => Ok(Self::Trade),
            "depth" => Ok(Self::Depth),
            _ => Err(FeedError::invalid_channel(s)),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kline (candlestick) interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KlineInterval {
    /// 1 second
    #[serde(rename = "1s")]
    S1,
    /// 1 minute
    #[serde(rename = "1m")]
    #[default]
    M1,
    /// 3 minutes
    #[serde(rename = "3m")]
    M3,
    /// 5 minutes
    #[serde(rename = "5m")]
    M5,
    /// 15 minutes
    #[serde(rename = "15m")]
    M15,
    /// 30 minutes
    #[serde(rename = "30m")]
    M30,
    /// 1 hour
    #[serde(rename = "1h")]
    H1,
    /// 2 hours
    #[serde(rename = "2h")]
    H2,
    /// 4 hours
    #[serde(rename = "4h")]
    H4,
    /// 6 hours
    #[serde(rename = "6h")]
    H6,
    /// 8 hours
    #[serde(rename = "8h")]
    H8,
    /// 12 hours
    #[serde(rename = "12h")]
    H12,
    /// 1 day
    #[serde(rename = "1d")]
    D1,
    /// 3 days
    #[serde(rename = "3d")]
    D3,
    /// 1 week
    #[serde(rename = "1w")]
    W1,
    /// 1 month
    #[serde(rename = "1M")]
    Mo1,
}

impl KlineInterval {
    /// Returns the interval code as used in stream tokens
    ///
    /// Note that `1M` (month) is the only case-sensitive code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S1 => "1s",
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
            Self::Mo1 => "1M",
        }
    }
}

impl FromStr for KlineInterval {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let interval = match s.trim() {
            "1s" => Self::S1,
            "1m" => Self::M1,
            "3m" => Self::M3,
            "5m" => Self::M5,
            "15m" => Self::M15,
            "30m" => Self::M30,
            "1h" => Self::H1,
            "2h" => Self::H2,
            "4h" => Self::H4,
            "6h" => Self::H6,
            "8h" => Self::H8,
            "12h" => Self::H12,
            "1d" => Self::D1,
            "3d" => Self::D3,
            "1w" => Self::W1,
            "1M" => Self::Mo1,
            _ => {
                return Err(FeedError::InvalidInterval {
                    interval: s.to_string(),
                })
            }
        };
        Ok(interval)
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial book depth levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DepthLevel {
    /// 5 price levels per side
    #[serde(rename = "5")]
    D5 = 5,
    /// 10 price levels per side
    #[serde(rename = "10")]
    D10 = 10,
    /// 20 price levels per side
    #[serde(rename = "20")]
    #[default]
    D20 = 20,
}

impl DepthLevel {
    /// Returns the depth as a u32
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

impl TryFrom<u32> for DepthLevel {
    type Error = FeedError;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        match level {
            5 => Ok(Self::D5),
            10 => Ok(Self::D10),
            20 => Ok(Self::D20),
            _ => Err(FeedError::InvalidDepthLevel { level }),
        }
    }
}

impl FromStr for DepthLevel {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = s
            .trim()
            .parse::<u32>()
            .map_err(|_| FeedError::InvalidDepthLevel { level: 0 })?;
        Self::try_from(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse_case_insensitive() {
        assert_eq!("TICKER".parse::<ChannelKind>().unwrap(), ChannelKind::Ticker);
        assert_eq!(" kline ".parse::<ChannelKind>().unwrap(), ChannelKind::Kline);
        assert!(matches!(
            "bookTicker".parse::<ChannelKind>(),
            Err(FeedError::InvalidChannel { .. })
        ));
    }

    #[test]
    fn test_channel_serde() {
        assert_eq!(serde_json::to_string(&ChannelKind::Depth).unwrap(), "\"depth\"");
        let parsed: ChannelKind = serde_json::from_str("\"trade\"").unwrap();
        assert_eq!(parsed, ChannelKind::Trade);
    }

    #[test]
    fn test_interval_codes() {
        assert_eq!("1h".parse::<KlineInterval>().unwrap(), KlineInterval::H1);
        assert_eq!("1M".parse::<KlineInterval>().unwrap(), KlineInterval::Mo1);
        assert_eq!(KlineInterval::Mo1.as_str(), "1M");
        assert_eq!(KlineInterval::default(), KlineInterval::M1);
        assert!("7m".parse::<KlineInterval>().is_err());
    }

    #[test]
    fn test_depth_level() {
        assert_eq!(DepthLevel::try_from(10).unwrap(), DepthLevel::D10);
        assert_eq!(DepthLevel::default().as_u32(), 20);
        assert!(matches!(
            DepthLevel::try_from(50),
            Err(FeedError::InvalidDepthLevel { level: 50 })
        ));
    }
}

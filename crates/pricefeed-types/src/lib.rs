//! Shared types for Binance-style market data streams
//!
//! This crate provides the pure, runtime-free half of the pricefeed SDK.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`ChannelKind`], [`KlineInterval`], [`DepthLevel`] - Stream channel enums
//! - [`Endpoint`] - Streaming base URLs
//! - [`StreamSpec`], [`ResolvedStream`], [`resolve_stream`] - Stream token and URL resolution
//! - [`MarketEvent`] - Normalized ticker, kline, trade and depth events
//! - [`normalize`], [`normalize_for_stream`] - Raw frame normalization
//! - [`FeedError`] - Caller-misuse errors raised at subscribe time

pub mod channel;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod normalize;
pub mod stream;

// Re-export commonly used types
pub use channel::*;
pub use endpoint::*;
pub use error::*;
pub use event::*;
pub use normalize::{normalize, normalize_for_stream};
pub use stream::*;

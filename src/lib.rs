//! # Bitfinex Connector
//!
//! A Rust client for the Bitfinex public REST and WebSocket v2 APIs.
//!
//! ## Modules
//!
//! - [`api`]: REST client for historical candles, recent trades, and
//!   ticker snapshots
//! - [`websocket`]: real-time candle and trade streaming over one shared
//!   connection
//! - [`connector`]: the [`MarketDataConnector`](connector::MarketDataConnector)
//!   capability trait and its Bitfinex implementation
//! - [`shared`]: domain model and types used by both transports
//!
//! ## Quick Start - REST
//!
//! ```rust,ignore
//! use bitfinex_connector::api::{BitfinexApiClient, CandleHistoryParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BitfinexApiClient::new("https://api-pub.bitfinex.com")?;
//!
//!     let candles = client
//!         .get_candle_series(CandleHistoryParams::new("btcusd", 60).with_limit(100))
//!         .await?;
//!     println!("fetched {} candles", candles.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start - Streaming
//!
//! ```rust,ignore
//! use bitfinex_connector::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = BitfinexConnector::new()?;
//!     let mut candles = connector.candle_updates();
//!     let mut sells = connector.sell_trades();
//!
//!     connector.subscribe_candles("btcusd", 60).await?;
//!     connector.subscribe_trades("btcusd").await?;
//!
//!     while let Ok(candle) = candles.recv().await {
//!         println!("{}: close {}", candle.pair, candle.close);
//!     }
//!     Ok(())
//! }
//! ```

/// Shared domain model and types used across API and WebSocket modules.
pub mod shared;

/// Network URL constants (REST and WebSocket endpoints).
pub mod network;

/// REST API client module for public market data.
pub mod api;

/// WebSocket client module for real-time data streaming.
pub mod websocket;

/// Capability trait and the connector facade tying both transports together.
pub mod connector;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use bitfinex_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{
        ApiError, ApiResult, BitfinexApiClient, BitfinexApiClientBuilder, CandleHistoryParams,
    };
    pub use crate::connector::{BitfinexConnector, MarketDataConnector};
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};
    pub use crate::shared::{
        candle_key, trading_symbol, Candle, CandlePeriod, Ticker, Trade, TradeSide,
        UnsupportedPeriod, WireError,
    };
    pub use crate::websocket::{
        BitfinexWebSocketClient, ConnectionState, WebSocketConfig, WebSocketError, WsEvent,
        WsEventStream, WsResult,
    };
}

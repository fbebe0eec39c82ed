//! REST API client module for the Bitfinex public endpoints.
//!
//! This module provides a type-safe HTTP client for the public market-data
//! endpoints: historical candles, recent trades, and ticker snapshots.
//!
//! # Quick Start
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
//!
//!     let trades = client.get_new_trades("btcusd", 50).await?;
//!     let ticker = client.get_ticker("btcusd").await?;
//!
//!     println!("{} candles, {} trades, last {}", candles.len(), trades.len(), ticker.last_price);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All methods return [`ApiResult<T>`]. A call either fully parses into a
//! result or fails as a whole:
//!
//! ```rust,ignore
//! match client.get_candle_series(params).await {
//!     Ok(candles) => println!("{} candles", candles.len()),
//!     Err(ApiError::UnsupportedPeriod(p)) => println!("bad period: {}", p),
//!     Err(ApiError::Upstream { status, .. }) => println!("exchange said {}", status),
//!     Err(e) => println!("other error: {}", e),
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{BitfinexApiClient, BitfinexApiClientBuilder};
pub use error::{ApiError, ApiResult};
pub use types::CandleHistoryParams;

//! Shared type definitions for the Bitfinex connector.
//!
//! This module contains types that are used by both the REST API and WebSocket modules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Candle Period (shared between API and WebSocket)
// ============================================================================

/// Candle period accepted by the Bitfinex candle endpoints.
///
/// Bitfinex identifies candle series by a period code embedded in the
/// channel key (e.g. `trade:1m:tBTCUSD`). Only the periods listed here are
/// supported; every other duration fails with [`UnsupportedPeriod`] before
/// any network traffic happens.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum CandlePeriod {
    /// 1 minute candles
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    /// 5 minute candles
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minute candles
    #[serde(rename = "15m")]
    FifteenMinutes,
}

impl CandlePeriod {
    /// Map a period length in seconds to its Bitfinex period code.
    pub fn from_secs(period_secs: u32) -> Result<Self, UnsupportedPeriod> {
        match period_secs {
            60 => Ok(Self::OneMinute),
            300 => Ok(Self::FiveMinutes),
            900 => Ok(Self::FifteenMinutes),
            other => Err(UnsupportedPeriod(other)),
        }
    }

    /// Get the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
        }
    }

    /// Period length in seconds.
    pub fn as_secs(&self) -> u32 {
        match self {
            Self::OneMinute => 60,
            Self::FiveMinutes => 300,
            Self::FifteenMinutes => 900,
        }
    }
}

impl std::fmt::Display for CandlePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested candle period is not one Bitfinex offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported candle period: {0}s (supported: 60, 300, 900)")]
pub struct UnsupportedPeriod(pub u32);

// ============================================================================
// Trade Side
// ============================================================================

/// Direction of an executed trade.
///
/// Bitfinex encodes the side in the sign of the raw amount; the sign is
/// consumed exactly once when a [`Trade`](crate::shared::Trade) is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Derive the side from a signed wire amount (`> 0` is a buy).
    pub fn from_signed_amount(amount: rust_decimal::Decimal) -> Self {
        if amount > rust_decimal::Decimal::ZERO {
            Self::Buy
        } else {
            Self::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Symbol formatting
// ============================================================================

/// Normalize a currency pair into a Bitfinex trading symbol.
///
/// The exchange only accepts upper-cased pairs prefixed with the trading
/// market marker `t` (`"btcusd"` becomes `"tBTCUSD"`).
pub fn trading_symbol(pair: &str) -> String {
    format!("t{}", pair.to_uppercase())
}

/// Build the candle channel key for a pair and period (`trade:1m:tBTCUSD`).
///
/// The same key addresses the REST history endpoint path and the WebSocket
/// candles subscription.
pub fn candle_key(period: CandlePeriod, pair: &str) -> String {
    format!("trade:{}:{}", period.as_str(), trading_symbol(pair))
}

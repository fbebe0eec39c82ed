//! Domain model for Bitfinex market data.
//!
//! Bitfinex returns positional JSON arrays rather than keyed objects, both
//! over REST and on WebSocket data frames. The parsers here map those rows
//! into immutable value structs and fail fast: one short or unconvertible
//! field rejects the whole row with a [`WireError`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::shared::types::TradeSide;

/// A row that does not match the expected positional layout.
#[derive(Debug, Clone, Error)]
pub enum WireError {
    #[error("expected at least {expected} fields, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("field {index} ({name}): {message}")]
    Field {
        index: usize,
        name: &'static str,
        message: String,
    },
}

/// One OHLCV candle for a pair.
///
/// `total_price` is always zero: the Bitfinex candle format has no such
/// field, but the value object keeps the slot so downstream consumers get a
/// uniform shape across exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub pair: String,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub total_price: Decimal,
}

impl Candle {
    /// Parse a candle row: `[MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]`.
    pub fn from_row(pair: &str, row: &[Value]) -> Result<Self, WireError> {
        check_len(row, 6)?;
        Ok(Self {
            pair: pair.to_string(),
            open_time: millis_at(row, 0, "open time")?,
            open: decimal_at(row, 1, "open")?,
            close: decimal_at(row, 2, "close")?,
            high: decimal_at(row, 3, "high")?,
            low: decimal_at(row, 4, "low")?,
            volume: decimal_at(row, 5, "volume")?,
            total_price: Decimal::ZERO,
        })
    }
}

/// One executed trade for a pair.
///
/// `amount` is stored as an absolute value; the sign of the raw amount is
/// consumed exactly once to produce `side`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub pair: String,
    pub id: String,
    pub time: DateTime<Utc>,
    pub amount: Decimal,
    pub side: TradeSide,
    pub price: Decimal,
}

impl Trade {
    /// Parse a trade row: `[ID, MTS, AMOUNT, PRICE]` (amount is signed).
    pub fn from_row(pair: &str, row: &[Value]) -> Result<Self, WireError> {
        check_len(row, 4)?;
        let amount = decimal_at(row, 2, "amount")?;
        Ok(Self {
            pair: pair.to_string(),
            id: id_at(row, 0, "id")?,
            time: millis_at(row, 1, "time")?,
            amount: amount.abs(),
            side: TradeSide::from_signed_amount(amount),
            price: decimal_at(row, 3, "price")?,
        })
    }
}

/// A ticker snapshot for a pair.
///
/// No identity beyond pair plus retrieval time; the upstream response is a
/// single flat array of ten numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: String,
    pub bid: Decimal,
    pub bid_size: Decimal,
    pub ask: Decimal,
    pub ask_size: Decimal,
    pub daily_change: Decimal,
    pub daily_change_relative: Decimal,
    pub last_price: Decimal,
    pub volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl Ticker {
    /// Parse the flat ticker array:
    /// `[BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_RELATIVE,
    /// LAST_PRICE, VOLUME, HIGH, LOW]`.
    pub fn from_array(pair: &str, row: &[Value]) -> Result<Self, WireError> {
        check_len(row, 10)?;
        Ok(Self {
            pair: pair.to_string(),
            bid: decimal_at(row, 0, "bid")?,
            bid_size: decimal_at(row, 1, "bid size")?,
            ask: decimal_at(row, 2, "ask")?,
            ask_size: decimal_at(row, 3, "ask size")?,
            daily_change: decimal_at(row, 4, "daily change")?,
            daily_change_relative: decimal_at(row, 5, "daily change relative")?,
            last_price: decimal_at(row, 6, "last price")?,
            volume: decimal_at(row, 7, "volume")?,
            high: decimal_at(row, 8, "high")?,
            low: decimal_at(row, 9, "low")?,
        })
    }
}

fn check_len(row: &[Value], expected: usize) -> Result<(), WireError> {
    if row.len() < expected {
        return Err(WireError::Truncated {
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

/// Parse a JSON value that may be either a number or a string into a
/// `Decimal`. Going through the number's literal text keeps the exchange's
/// precision intact instead of round-tripping through f64.
fn decimal_at(row: &[Value], index: usize, name: &'static str) -> Result<Decimal, WireError> {
    let value = &row[index];
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(WireError::Field {
                index,
                name,
                message: format!("expected a number, got {other}"),
            })
        }
    };
    // Small amounts render in scientific notation (e.g. 1e-8)
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| WireError::Field {
            index,
            name,
            message: e.to_string(),
        })
}

fn millis_at(row: &[Value], index: usize, name: &'static str) -> Result<DateTime<Utc>, WireError> {
    let value = &row[index];
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| WireError::Field {
            index,
            name,
            message: format!("expected a millisecond timestamp, got {value}"),
        })?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| WireError::Field {
        index,
        name,
        message: format!("timestamp out of range: {millis}"),
    })
}

/// Exchange-assigned ids arrive as numbers but are opaque; keep them as text.
fn id_at(row: &[Value], index: usize, name: &'static str) -> Result<String, WireError> {
    match &row[index] {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(WireError::Field {
            index,
            name,
            message: format!("expected an id, got {other}"),
        }),
    }
}

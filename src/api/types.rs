//! Request parameter types for the Bitfinex REST API.

use chrono::{DateTime, Utc};

/// Query parameters for `GET /v2/candles/trade:{period}:{symbol}/hist`.
#[derive(Debug, Clone, Default)]
pub struct CandleHistoryParams {
    /// Currency pair, e.g. `"BTCUSD"` (case-insensitive)
    pub pair: String,
    /// Candle period in seconds (60, 300 or 900)
    pub period_secs: u32,
    /// Start of the window (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// End of the window (inclusive)
    pub to: Option<DateTime<Utc>>,
    /// Max number of candles; only sent when positive
    pub limit: Option<u32>,
}

impl CandleHistoryParams {
    /// Create new params for a pair and period.
    pub fn new(pair: impl Into<String>, period_secs: u32) -> Self {
        Self {
            pair: pair.into(),
            period_secs,
            ..Default::default()
        }
    }

    /// Set the start of the window.
    pub fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the end of the window.
    pub fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Set both ends of the window.
    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Set the result limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_candle_history_params() {
        let from = Utc.timestamp_millis_opt(1700000000000).unwrap();
        let to = Utc.timestamp_millis_opt(1700003600000).unwrap();

        let params = CandleHistoryParams::new("btcusd", 60)
            .with_time_range(from, to)
            .with_limit(100);

        assert_eq!(params.pair, "btcusd");
        assert_eq!(params.period_secs, 60);
        assert_eq!(params.from, Some(from));
        assert_eq!(params.to, Some(to));
        assert_eq!(params.limit, Some(100));
    }

    #[test]
    fn test_defaults_empty() {
        let params = CandleHistoryParams::new("ethusd", 300);
        assert!(params.from.is_none());
        assert!(params.to.is_none());
        assert!(params.limit.is_none());
    }
}

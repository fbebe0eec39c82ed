//! Bitfinex REST API client implementation.
//!
//! The [`BitfinexApiClient`] provides a type-safe interface for the public
//! (unauthenticated) market-data endpoints.
//!
//! # Example
//!
//! ```rust,ignore
//! use bitfinex_connector::api::{BitfinexApiClient, CandleHistoryParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BitfinexApiClient::new("https://api-pub.bitfinex.com")?;
//!
//!     let candles = client
//!         .get_candle_series(CandleHistoryParams::new("btcusd", 60).with_limit(10))
//!         .await?;
//!     println!("got {} candles", candles.len());
//!
//!     let ticker = client.get_ticker("btcusd").await?;
//!     println!("last price: {}", ticker.last_price);
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::CandleHistoryParams;
use crate::shared::{candle_key, trading_symbol, Candle, CandlePeriod, Ticker, Trade};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builder for configuring [`BitfinexApiClient`].
#[derive(Debug, Clone)]
pub struct BitfinexApiClientBuilder {
    base_url: String,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
}

impl BitfinexApiClientBuilder {
    /// Create a new builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_headers: Vec::new(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Add a default header to all requests.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Build the client.
    pub fn build(self) -> ApiResult<BitfinexApiClient> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        for (name, value) in self.default_headers {
            let header_name = reqwest::header::HeaderName::try_from(name.as_str()).map_err(|e| {
                ApiError::InvalidParameter(format!("invalid header name '{}': {}", name, e))
            })?;
            let header_value = reqwest::header::HeaderValue::from_str(&value).map_err(|e| {
                ApiError::InvalidParameter(format!("invalid header value for '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let http_client = Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .default_headers(headers)
            .build()?;

        Ok(BitfinexApiClient {
            http_client,
            base_url: self.base_url,
        })
    }
}

/// Bitfinex public REST API client.
///
/// Stateless: every method performs exactly one request and maps the
/// positional response into the domain model, or fails the whole call.
#[derive(Debug, Clone)]
pub struct BitfinexApiClient {
    http_client: Client,
    base_url: String,
}

impl BitfinexApiClient {
    /// Create a new client with the given base URL and default settings
    /// (30 s timeout, connection pooling, `accept: application/json`).
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        BitfinexApiClientBuilder::new(base_url).build()
    }

    /// Create a new client builder for custom configuration.
    pub fn builder(base_url: impl Into<String>) -> BitfinexApiClientBuilder {
        BitfinexApiClientBuilder::new(base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Execute a GET request; non-2xx statuses become
    /// [`ApiError::Upstream`] carrying the status code and raw body.
    async fn get_text(&self, url: &str) -> ApiResult<String> {
        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn candle_history_url(&self, params: &CandleHistoryParams) -> ApiResult<String> {
        let period = CandlePeriod::from_secs(params.period_secs)?;
        let mut url = format!(
            "{}/v2/candles/{}/hist",
            self.base_url,
            candle_key(period, &params.pair)
        );

        let mut query = Vec::new();
        if let Some(from) = params.from {
            query.push(format!("start={}", from.timestamp_millis()));
        }
        if let Some(to) = params.to {
            query.push(format!("end={}", to.timestamp_millis()));
        }
        if let Some(limit) = params.limit {
            if limit > 0 {
                query.push(format!("limit={}", limit));
            }
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        Ok(url)
    }

    fn trades_url(&self, pair: &str, max_count: u32) -> String {
        let mut url = format!(
            "{}/v2/trades/{}/hist?",
            self.base_url,
            trading_symbol(pair)
        );
        if max_count > 0 {
            url.push_str(&format!("limit={}&", max_count));
        }
        // Newest first
        url.push_str("sort=-1");
        url
    }

    /// Parse a body that must be an array of positional rows.
    fn parse_rows(body: &str) -> ApiResult<Vec<Vec<Value>>> {
        serde_json::from_str(body)
            .map_err(|e| ApiError::malformed(format!("expected an array of rows: {e}"), body))
    }

    // =========================================================================
    // Market data endpoints
    // =========================================================================

    /// Get historical candles for a pair.
    ///
    /// Fails with [`ApiError::UnsupportedPeriod`] before any network call if
    /// the period is not 60, 300 or 900 seconds. A response containing any
    /// short or unconvertible row fails the whole call with
    /// [`ApiError::Malformed`]; no partial series is returned.
    pub async fn get_candle_series(&self, params: CandleHistoryParams) -> ApiResult<Vec<Candle>> {
        let url = self.candle_history_url(&params)?;
        let pair = params.pair.to_uppercase();

        tracing::debug!(pair = %pair, period_secs = params.period_secs, "fetching candle history");
        let body = self.get_text(&url).await?;

        let rows = Self::parse_rows(&body)?;
        let candles = rows
            .iter()
            .map(|row| Candle::from_row(&pair, row).map_err(|e| ApiError::malformed(e, &body)))
            .collect::<ApiResult<Vec<_>>>()?;

        tracing::debug!(pair = %pair, count = candles.len(), "candle history fetched");
        Ok(candles)
    }

    /// Get the most recent trades for a pair, newest first.
    ///
    /// `max_count` becomes the `limit` query parameter when positive.
    pub async fn get_new_trades(&self, pair: &str, max_count: u32) -> ApiResult<Vec<Trade>> {
        let url = self.trades_url(pair, max_count);
        let pair = pair.to_uppercase();

        tracing::debug!(pair = %pair, max_count, "fetching recent trades");
        let body = self.get_text(&url).await?;

        let rows = Self::parse_rows(&body)?;
        let trades = rows
            .iter()
            .map(|row| Trade::from_row(&pair, row).map_err(|e| ApiError::malformed(e, &body)))
            .collect::<ApiResult<Vec<_>>>()?;

        tracing::debug!(pair = %pair, count = trades.len(), "recent trades fetched");
        Ok(trades)
    }

    /// Get a ticker snapshot for a pair.
    ///
    /// The upstream response is a single flat array; fewer than ten elements
    /// fails with [`ApiError::Malformed`].
    pub async fn get_ticker(&self, pair: &str) -> ApiResult<Ticker> {
        let url = format!("{}/v2/ticker/{}", self.base_url, trading_symbol(pair));
        let pair = pair.to_uppercase();

        tracing::debug!(pair = %pair, "fetching ticker");
        let body = self.get_text(&url).await?;

        let row: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| ApiError::malformed(format!("expected a flat array: {e}"), &body))?;
        let ticker =
            Ticker::from_array(&pair, &row).map_err(|e| ApiError::malformed(e, &body))?;

        tracing::debug!(pair = %pair, last_price = %ticker.last_price, "ticker fetched");
        Ok(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn client() -> BitfinexApiClient {
        BitfinexApiClient::new("https://api-pub.bitfinex.com").unwrap()
    }

    #[test]
    fn test_client_creation() {
        assert_eq!(client().base_url(), "https://api-pub.bitfinex.com");
    }

    #[test]
    fn test_client_builder_trims_trailing_slash() {
        let client = BitfinexApiClient::builder("https://api-pub.bitfinex.com/")
            .timeout_secs(60)
            .header("X-Custom", "test")
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "https://api-pub.bitfinex.com");
    }

    #[test]
    fn test_candle_history_url() {
        let from = Utc.timestamp_millis_opt(1700000000000).unwrap();
        let to = Utc.timestamp_millis_opt(1700003600000).unwrap();
        let params = CandleHistoryParams::new("btcusd", 60)
            .with_time_range(from, to)
            .with_limit(25);

        let url = client().candle_history_url(&params).unwrap();
        assert_eq!(
            url,
            "https://api-pub.bitfinex.com/v2/candles/trade:1m:tBTCUSD/hist?start=1700000000000&end=1700003600000&limit=25"
        );
    }

    #[test]
    fn test_candle_history_url_without_query() {
        let params = CandleHistoryParams::new("ethusd", 300);
        let url = client().candle_history_url(&params).unwrap();
        assert_eq!(
            url,
            "https://api-pub.bitfinex.com/v2/candles/trade:5m:tETHUSD/hist"
        );
    }

    #[test]
    fn test_zero_limit_not_sent() {
        let params = CandleHistoryParams::new("btcusd", 60).with_limit(0);
        let url = client().candle_history_url(&params).unwrap();
        assert!(!url.contains("limit"));
    }

    #[test]
    fn test_unsupported_period_fails_before_request() {
        let params = CandleHistoryParams::new("btcusd", 120);
        let err = client().candle_history_url(&params).unwrap_err();
        assert!(matches!(
            err,
            ApiError::UnsupportedPeriod(crate::shared::UnsupportedPeriod(120))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_period_issues_no_network_call() {
        // An unroutable base URL: the call can only succeed in returning
        // early, before any request is attempted.
        let client = BitfinexApiClient::new("http://192.0.2.1:1").unwrap();
        let err = client
            .get_candle_series(CandleHistoryParams::new("btcusd", 7))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedPeriod(_)));
    }

    #[test]
    fn test_trades_url() {
        assert_eq!(
            client().trades_url("btcusd", 50),
            "https://api-pub.bitfinex.com/v2/trades/tBTCUSD/hist?limit=50&sort=-1"
        );
        assert_eq!(
            client().trades_url("btcusd", 0),
            "https://api-pub.bitfinex.com/v2/trades/tBTCUSD/hist?sort=-1"
        );
    }

    #[test]
    fn test_parse_rows_rejects_non_array() {
        let err = BitfinexApiClient::parse_rows(r#"{"error":"nope"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Malformed { .. }));
    }

    #[test]
    fn test_parse_rows_rejects_mixed_elements() {
        let err = BitfinexApiClient::parse_rows(r#"[[1, 2], "not-a-row"]"#).unwrap_err();
        assert!(matches!(err, ApiError::Malformed { .. }));
    }
}

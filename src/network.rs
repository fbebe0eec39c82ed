//! Network URL constants for the Bitfinex connector.

/// Default public REST API base URL for Bitfinex.
pub const DEFAULT_API_URL: &str = "https://api-pub.bitfinex.com";

/// Default public WebSocket v2 URL for Bitfinex.
pub const DEFAULT_WS_URL: &str = "wss://api-pub.bitfinex.com/ws/2";

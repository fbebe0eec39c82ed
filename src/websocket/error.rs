//! WebSocket-specific error types for the Bitfinex connector.

use thiserror::Error;

use crate::shared::UnsupportedPeriod;

/// WebSocket-specific errors
#[derive(Debug, Clone, Error)]
pub enum WebSocketError {
    /// Initial connection failure
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Unexpected connection close
    #[error("connection closed: code {code}, reason: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// JSON deserialization failure
    #[error("failed to parse message: {0}")]
    MessageParseError(String),

    /// Subscription rejected by the exchange
    #[error("subscription failed: {message} (code: {code})")]
    SubscriptionFailed { code: i64, message: String },

    /// Requested candle period is not in the supported set
    #[error(transparent)]
    UnsupportedPeriod(#[from] UnsupportedPeriod),

    /// WebSocket protocol error
    #[error("websocket protocol error: {0}")]
    Protocol(String),

    /// Not connected
    #[error("not connected to the streaming endpoint")]
    NotConnected,

    /// Send failed
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Channel closed
    #[error("internal channel closed")]
    ChannelClosed,

    /// Invalid URL
    #[error("invalid websocket URL: {0}")]
    InvalidUrl(String),

    /// Timeout
    #[error("operation timed out")]
    Timeout,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for WebSocketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed => WebSocketError::ConnectionClosed {
                code: 1000,
                reason: "connection closed normally".to_string(),
            },
            Error::AlreadyClosed => WebSocketError::NotConnected,
            Error::Io(e) => WebSocketError::Io(e.to_string()),
            Error::Protocol(e) => WebSocketError::Protocol(e.to_string()),
            Error::Url(e) => WebSocketError::InvalidUrl(e.to_string()),
            Error::Http(resp) => {
                WebSocketError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => WebSocketError::ConnectionFailed(e.to_string()),
            other => WebSocketError::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WebSocketError {
    fn from(err: serde_json::Error) -> Self {
        WebSocketError::MessageParseError(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for WebSocketError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        WebSocketError::ChannelClosed
    }
}

/// Result type alias for WebSocket operations
pub type WsResult<T> = Result<T, WebSocketError>;

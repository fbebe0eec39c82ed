//! Message types for the Bitfinex WebSocket v2 protocol.
//!
//! Control messages and protocol events are JSON objects keyed by `event`;
//! everything else on the socket is a positional JSON array (a data frame)
//! whose first element is the numeric channel id assigned in the
//! `subscribed` acknowledgment.

use serde::{Deserialize, Serialize};

use crate::shared::{Candle, Trade};
use crate::websocket::error::WebSocketError;

// ============================================================================
// REQUEST TYPES (Client → Server)
// ============================================================================

/// Subscribe control message.
///
/// The candles channel is addressed by `key` (`trade:1m:tBTCUSD`), the
/// trades channel by `symbol` (`tBTCUSD`).
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub event: &'static str,
    pub channel: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl SubscribeRequest {
    /// Subscribe to a candle series by channel key.
    pub fn candles(key: impl Into<String>) -> Self {
        Self {
            event: "subscribe",
            channel: "candles",
            key: Some(key.into()),
            symbol: None,
        }
    }

    /// Subscribe to the executed-trades feed of a symbol.
    pub fn trades(symbol: impl Into<String>) -> Self {
        Self {
            event: "subscribe",
            channel: "trades",
            key: None,
            symbol: Some(symbol.into()),
        }
    }
}

/// Unsubscribe control message, addressed by the channel id from the
/// `subscribed` acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest {
    pub event: &'static str,
    #[serde(rename = "chanId")]
    pub chan_id: u64,
}

impl UnsubscribeRequest {
    pub fn new(chan_id: u64) -> Self {
        Self {
            event: "unsubscribe",
            chan_id,
        }
    }
}

// ============================================================================
// RESPONSE TYPES (Server → Client)
// ============================================================================

/// Protocol events sent by the exchange as JSON objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Sent once right after the connection opens.
    Info {
        #[serde(default)]
        version: Option<u32>,
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        msg: Option<String>,
    },
    /// Acknowledges a subscribe request and assigns the channel id.
    Subscribed {
        channel: String,
        #[serde(rename = "chanId")]
        chan_id: u64,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        symbol: Option<String>,
        #[serde(default)]
        pair: Option<String>,
    },
    /// Acknowledges an unsubscribe request.
    Unsubscribed {
        status: String,
        #[serde(rename = "chanId")]
        chan_id: u64,
    },
    /// Error event, e.g. a rejected subscription.
    Error {
        msg: String,
        #[serde(default)]
        code: i64,
    },
    #[serde(other)]
    Unknown,
}

// ============================================================================
// CLIENT EVENTS
// ============================================================================

/// Events emitted by the WebSocket client
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Successfully connected to the streaming endpoint
    Connected,

    /// Disconnected; the connection is terminal, re-subscribe to reconnect
    Disconnected { reason: String },

    /// The exchange confirmed a subscription and assigned a channel id
    SubscriptionConfirmed { channel: String, chan_id: u64 },

    /// The exchange confirmed an unsubscription
    Unsubscribed { chan_id: u64 },

    /// A candle update on a subscribed series
    Candle { pair: String, candle: Candle },

    /// An executed trade on a subscribed symbol
    Trade { pair: String, trade: Trade },

    /// Error occurred
    Error { error: WebSocketError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_candles_serialization() {
        let request = SubscribeRequest::candles("trade:1m:tBTCUSD");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"event":"subscribe","channel":"candles","key":"trade:1m:tBTCUSD"}"#
        );
    }

    #[test]
    fn test_subscribe_trades_serialization() {
        let request = SubscribeRequest::trades("tBTCUSD");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"event":"subscribe","channel":"trades","symbol":"tBTCUSD"}"#
        );
    }

    #[test]
    fn test_unsubscribe_serialization() {
        let request = UnsubscribeRequest::new(42);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"event":"unsubscribe","chanId":42}"#);
    }

    #[test]
    fn test_subscribed_ack_deserialization() {
        let json = r#"{"event":"subscribed","channel":"candles","chanId":343351,"key":"trade:1m:tBTCUSD"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Subscribed {
                channel,
                chan_id,
                key,
                ..
            } => {
                assert_eq!(channel, "candles");
                assert_eq!(chan_id, 343351);
                assert_eq!(key.as_deref(), Some("trade:1m:tBTCUSD"));
            }
            other => panic!("expected Subscribed, got {:?}", other),
        }
    }

    #[test]
    fn test_trades_ack_deserialization() {
        let json = r#"{"event":"subscribed","channel":"trades","chanId":19111,"symbol":"tBTCUSD","pair":"BTCUSD"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::Subscribed {
                channel,
                chan_id,
                symbol,
                pair,
                ..
            } => {
                assert_eq!(channel, "trades");
                assert_eq!(chan_id, 19111);
                assert_eq!(symbol.as_deref(), Some("tBTCUSD"));
                assert_eq!(pair.as_deref(), Some("BTCUSD"));
            }
            other => panic!("expected Subscribed, got {:?}", other),
        }
    }

    #[test]
    fn test_info_and_error_deserialization() {
        let info: ServerEvent =
            serde_json::from_str(r#"{"event":"info","version":2,"platform":{"status":1}}"#)
                .unwrap();
        assert!(matches!(
            info,
            ServerEvent::Info {
                version: Some(2),
                ..
            }
        ));

        let error: ServerEvent =
            serde_json::from_str(r#"{"event":"error","msg":"symbol: invalid","code":10300}"#)
                .unwrap();
        match error {
            ServerEvent::Error { msg, code } => {
                assert_eq!(msg, "symbol: invalid");
                assert_eq!(code, 10300);
            }
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_tolerated() {
        let event: ServerEvent = serde_json::from_str(r#"{"event":"conf","status":"OK"}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }
}

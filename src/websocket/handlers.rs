//! Message handling for the WebSocket connection.
//!
//! Every inbound text frame goes through [`MessageHandler::handle_message`]:
//! JSON objects are protocol events (`info`, `subscribed`, `unsubscribed`,
//! `error`), JSON arrays are data frames correlated to a subscription by the
//! numeric channel id in their first element. Malformed frames are logged
//! and dropped; they never take the receive loop down.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::shared::{Candle, Trade};
use crate::websocket::error::WebSocketError;
use crate::websocket::subscriptions::{Subscription, SubscriptionManager};
use crate::websocket::types::{ServerEvent, WsEvent};

/// Handles incoming WebSocket messages
#[derive(Debug)]
pub struct MessageHandler {
    /// Subscription tables shared with the client
    subscriptions: Arc<RwLock<SubscriptionManager>>,
}

impl MessageHandler {
    /// Create a new message handler over the shared subscription tables
    pub fn new(subscriptions: Arc<RwLock<SubscriptionManager>>) -> Self {
        Self { subscriptions }
    }

    /// Handle an incoming message and return events
    pub async fn handle_message(&self, text: &str) -> Vec<WsEvent> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("dropping unparseable frame: {e}");
                return vec![];
            }
        };

        match value {
            Value::Object(_) => self.handle_event(value).await,
            Value::Array(frame) => self.handle_frame(&frame).await,
            other => {
                tracing::warn!("dropping unexpected frame shape: {other}");
                vec![]
            }
        }
    }

    /// Handle a protocol event (JSON object).
    async fn handle_event(&self, value: Value) -> Vec<WsEvent> {
        let event: ServerEvent = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("dropping unrecognized event: {e}");
                return vec![];
            }
        };

        match event {
            ServerEvent::Info { version, code, msg } => {
                tracing::debug!(?version, ?code, ?msg, "info event received");
                vec![]
            }
            ServerEvent::Subscribed {
                channel,
                chan_id,
                key,
                symbol,
                ..
            } => {
                // The ack echoes whichever of key/symbol the subscribe used
                let routing_key = key.or(symbol).unwrap_or_default();
                let confirmed = self
                    .subscriptions
                    .write()
                    .await
                    .confirm(&routing_key, chan_id);

                match confirmed {
                    Some(subscription) => {
                        tracing::debug!(
                            channel = %channel,
                            chan_id,
                            pair = subscription.pair(),
                            "subscription confirmed"
                        );
                        vec![WsEvent::SubscriptionConfirmed { channel, chan_id }]
                    }
                    None => {
                        tracing::warn!(
                            channel = %channel,
                            chan_id,
                            routing_key = %routing_key,
                            "acknowledgment for a subscription no longer pending, dropped"
                        );
                        vec![]
                    }
                }
            }
            ServerEvent::Unsubscribed { status, chan_id } => {
                // Usually already removed locally when the unsubscribe was sent
                self.subscriptions.write().await.remove(chan_id);
                tracing::debug!(chan_id, status = %status, "unsubscription confirmed");
                vec![WsEvent::Unsubscribed { chan_id }]
            }
            ServerEvent::Error { msg, code } => {
                tracing::error!(code, "exchange error: {msg}");
                vec![WsEvent::Error {
                    error: WebSocketError::SubscriptionFailed { code, message: msg },
                }]
            }
            ServerEvent::Unknown => {
                tracing::debug!("ignoring unknown protocol event");
                vec![]
            }
        }
    }

    /// Handle a data frame (JSON array keyed by channel id).
    async fn handle_frame(&self, frame: &[Value]) -> Vec<WsEvent> {
        if frame.len() < 2 {
            tracing::warn!("dropping short data frame");
            return vec![];
        }

        let Some(chan_id) = frame[0].as_u64() else {
            tracing::warn!("dropping data frame without a numeric channel id");
            return vec![];
        };

        let subscription = {
            let subscriptions = self.subscriptions.read().await;
            subscriptions.resolve(chan_id).cloned()
        };
        let Some(subscription) = subscription else {
            // Frames can still be in flight after an unsubscribe
            tracing::debug!(chan_id, "dropping frame for unknown channel");
            return vec![];
        };

        if frame[1].as_str() == Some("hb") {
            tracing::trace!(chan_id, "heartbeat");
            return vec![];
        }

        match subscription {
            Subscription::Candles { pair, .. } => Self::candle_events(&pair, &frame[1]),
            Subscription::Trades { pair } => Self::trade_events(&pair, &frame[1..]),
        }
    }

    /// Parse a candle payload: a snapshot (array of rows) or one update row.
    fn candle_events(pair: &str, payload: &Value) -> Vec<WsEvent> {
        let Some(rows) = payload.as_array() else {
            tracing::warn!(pair, "dropping candle frame without row payload");
            return vec![];
        };
        if rows.is_empty() {
            return vec![];
        }

        let parsed: Result<Vec<Candle>, _> = if rows.first().map(Value::is_array).unwrap_or(false)
        {
            rows.iter()
                .map(|row| Candle::from_row(pair, row.as_array().map_or(&[], Vec::as_slice)))
                .collect()
        } else {
            Candle::from_row(pair, rows).map(|candle| vec![candle])
        };

        match parsed {
            Ok(candles) => candles
                .into_iter()
                .map(|candle| WsEvent::Candle {
                    pair: pair.to_string(),
                    candle,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(pair, "dropping malformed candle frame: {e}");
                vec![]
            }
        }
    }

    /// Parse a trade payload: a snapshot, or a `"te"` execution (`"tu"`
    /// repeats the same trade with settlement detail and is skipped).
    fn trade_events(pair: &str, payload: &[Value]) -> Vec<WsEvent> {
        match payload[0].as_str() {
            Some("te") => {
                let Some(row) = payload.get(1).and_then(Value::as_array) else {
                    tracing::warn!(pair, "dropping trade execution without row");
                    return vec![];
                };
                match Trade::from_row(pair, row) {
                    Ok(trade) => vec![WsEvent::Trade {
                        pair: pair.to_string(),
                        trade,
                    }],
                    Err(e) => {
                        tracing::warn!(pair, "dropping malformed trade frame: {e}");
                        vec![]
                    }
                }
            }
            Some("tu") => {
                tracing::trace!(pair, "skipping trade settlement update");
                vec![]
            }
            Some(other) => {
                tracing::debug!(pair, message_type = other, "ignoring trade channel message");
                vec![]
            }
            None => {
                // Snapshot: array of rows
                let Some(rows) = payload[0].as_array() else {
                    tracing::warn!(pair, "dropping trade frame without payload");
                    return vec![];
                };
                let parsed: Result<Vec<Trade>, _> = rows
                    .iter()
                    .map(|row| Trade::from_row(pair, row.as_array().map_or(&[], Vec::as_slice)))
                    .collect();
                match parsed {
                    Ok(trades) => trades
                        .into_iter()
                        .map(|trade| WsEvent::Trade {
                            pair: pair.to_string(),
                            trade,
                        })
                        .collect(),
                    Err(e) => {
                        tracing::warn!(pair, "dropping malformed trade snapshot: {e}");
                        vec![]
                    }
                }
            }
        }
    }
}

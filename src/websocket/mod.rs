//! WebSocket client module for real-time Bitfinex market data.
//!
//! One [`BitfinexWebSocketClient`] manages one connection. Logical
//! subscriptions (candle series and trade feeds, keyed by pair and
//! parameters) are multiplexed over it and correlated to inbound data
//! frames by the numeric channel id the exchange assigns on subscription.
//! The connection is torn down when the last subscription is removed;
//! reconnection after a failure is the caller's call, never automatic.

pub mod client;
pub mod error;
pub mod handlers;
pub mod subscriptions;
pub mod types;

pub use client::{BitfinexWebSocketClient, ConnectionState, WebSocketConfig, WsEventStream};
pub use error::{WebSocketError, WsResult};
pub use subscriptions::{Subscription, SubscriptionManager};
pub use types::{ServerEvent, SubscribeRequest, UnsubscribeRequest, WsEvent};

//! Integration tests for the WebSocket client and connector facade.
//!
//! These tests hold a live connection to the public Bitfinex streaming
//! endpoint and are marked as ignored by default. Run with:
//! `cargo test --test websocket_integration -- --ignored`

use std::time::Duration;

use bitfinex_connector::connector::{BitfinexConnector, MarketDataConnector};
use bitfinex_connector::websocket::{
    BitfinexWebSocketClient, ConnectionState, WsEvent,
};
use futures_util::StreamExt;

const EVENT_TIMEOUT: Duration = Duration::from_secs(20);

#[tokio::test]
#[ignore = "requires network access to api-pub.bitfinex.com"]
async fn test_connect_and_disconnect() {
    let mut client = BitfinexWebSocketClient::connect_default()
        .await
        .expect("failed to connect");
    assert!(client.is_open().await);

    client.disconnect().await.expect("failed to disconnect");
    assert_eq!(
        client.connection_state().await,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
#[ignore = "requires network access to api-pub.bitfinex.com"]
async fn test_candle_subscription_lifecycle() {
    let mut client = BitfinexWebSocketClient::connect_default()
        .await
        .expect("failed to connect");
    let mut events = client.event_stream().expect("event stream already taken");

    client
        .subscribe_candles("btcusd", 60)
        .await
        .expect("subscribe failed");

    // Wait for the acknowledgment, then for the snapshot
    let mut confirmed = false;
    let mut saw_candle = false;
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while let Ok(Some(event)) =
        tokio::time::timeout_at(deadline, events.next()).await
    {
        match event {
            WsEvent::SubscriptionConfirmed { channel, .. } => {
                assert_eq!(channel, "candles");
                confirmed = true;
            }
            WsEvent::Candle { pair, candle } => {
                assert_eq!(pair, "BTCUSD");
                assert!(candle.high >= candle.low);
                saw_candle = true;
                break;
            }
            _ => {}
        }
    }
    assert!(confirmed, "no subscription acknowledgment within timeout");
    assert!(saw_candle, "no candle within timeout");

    // Removing the last subscription closes the transport
    client
        .unsubscribe_candles("btcusd")
        .await
        .expect("unsubscribe failed");
    assert_eq!(
        client.connection_state().await,
        ConnectionState::Disconnected
    );
    assert_eq!(client.subscription_count().await, 0);
}

#[tokio::test]
#[ignore = "requires network access to api-pub.bitfinex.com"]
async fn test_subscribe_twice_keeps_single_entry() {
    let mut client = BitfinexWebSocketClient::connect_default()
        .await
        .expect("failed to connect");

    client.subscribe_candles("btcusd", 60).await.unwrap();
    client.subscribe_candles("btcusd", 60).await.unwrap();
    assert_eq!(client.subscription_count().await, 1);

    client.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "requires network access to api-pub.bitfinex.com"]
async fn test_connector_observers_receive_trades() {
    let connector = BitfinexConnector::new().expect("failed to build connector");

    let mut events = connector.events();
    let mut buys = connector.buy_trades();
    let mut sells = connector.sell_trades();

    connector
        .subscribe_trades("btcusd")
        .await
        .expect("subscribe failed");

    // The snapshot alone carries both sides on an active pair
    let trade = tokio::time::timeout(EVENT_TIMEOUT, async {
        tokio::select! {
            t = buys.recv() => t,
            t = sells.recv() => t,
        }
    })
    .await
    .expect("no trade within timeout")
    .expect("observer channel closed");
    assert_eq!(trade.pair, "BTCUSD");

    // Lifecycle events reach the catch-all observer channel
    let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("no event within timeout")
        .expect("event channel closed");
    assert!(matches!(
        event,
        WsEvent::Connected
            | WsEvent::SubscriptionConfirmed { .. }
            | WsEvent::Trade { .. }
    ));

    connector.unsubscribe_trades("btcusd").await.unwrap();
    connector.close().await.unwrap();
}

//! Bitfinex WebSocket client implementation.
//!
//! One client owns one connection. A single background task is the sole
//! reader of the socket; subscribe/unsubscribe operations send control
//! messages through a command channel and share the subscription tables
//! with the message handler. There is no automatic reconnection: when the
//! connection dies the client reports `Disconnected` and the caller decides
//! whether to subscribe again on a fresh client.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::network::DEFAULT_WS_URL;
use crate::shared::CandlePeriod;
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::MessageHandler;
use crate::websocket::subscriptions::{Subscription, SubscriptionManager};
use crate::websocket::types::{UnsubscribeRequest, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Timeout for establishing the connection (seconds)
    pub connect_timeout_secs: u64,
    /// Capacity of the event channel. Default: 1000
    pub event_channel_capacity: usize,
    /// Capacity of the command channel. Default: 100
    pub command_channel_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            event_channel_capacity: 1000,
            command_channel_capacity: 100,
        }
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Internal command for the connection task
enum ConnectionCommand {
    Send(String),
    Disconnect,
}

pin_project! {
    /// Stream of [`WsEvent`]s produced by the connection task.
    ///
    /// Obtained once from [`BitfinexWebSocketClient::event_stream`]; ends
    /// when the connection task stops.
    pub struct WsEventStream {
        #[pin]
        rx: mpsc::Receiver<WsEvent>,
    }
}

impl WsEventStream {
    pub(crate) fn new(rx: mpsc::Receiver<WsEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or `None` once the connection task stopped.
    pub async fn recv(&mut self) -> Option<WsEvent> {
        self.rx.recv().await
    }
}

impl Stream for WsEventStream {
    type Item = WsEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        this.rx.poll_recv(cx)
    }
}

/// Streaming client for the Bitfinex WebSocket v2 API.
///
/// # Example
///
/// ```ignore
/// use bitfinex_connector::websocket::*;
/// use futures_util::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), WebSocketError> {
///     let mut client = BitfinexWebSocketClient::connect_default().await?;
///     let mut events = client.event_stream().unwrap();
///
///     client.subscribe_candles("btcusd", 60).await?;
///
///     while let Some(event) = events.next().await {
///         if let WsEvent::Candle { pair, candle } = event {
///             println!("{pair}: close {}", candle.close);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct BitfinexWebSocketClient {
    url: String,
    config: WebSocketConfig,
    state: Arc<RwLock<ConnectionState>>,
    subscriptions: Arc<RwLock<SubscriptionManager>>,
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    event_rx: Option<mpsc::Receiver<WsEvent>>,
    connection_task: Option<tokio::task::JoinHandle<()>>,
}

impl BitfinexWebSocketClient {
    /// Connect to the default Bitfinex streaming endpoint
    /// (`wss://api-pub.bitfinex.com/ws/2`).
    pub async fn connect_default() -> WsResult<Self> {
        Self::connect(DEFAULT_WS_URL, WebSocketConfig::default()).await
    }

    /// Connect to a streaming endpoint with the given configuration.
    pub async fn connect(url: &str, config: WebSocketConfig) -> WsResult<Self> {
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| WebSocketError::Timeout)?
            .map_err(WebSocketError::from)?;

        *state.write().await = ConnectionState::Open;
        tracing::info!(url, "connected to streaming endpoint");

        let (sink, source) = ws_stream.split();
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);

        let subscriptions = Arc::new(RwLock::new(SubscriptionManager::new()));
        let handler = MessageHandler::new(subscriptions.clone());

        let handle = tokio::spawn(connection_task(
            sink,
            source,
            cmd_rx,
            handler,
            event_tx.clone(),
            state.clone(),
        ));

        let _ = event_tx.send(WsEvent::Connected).await;

        Ok(Self {
            url: url.to_string(),
            config,
            state,
            subscriptions,
            cmd_tx,
            event_rx: Some(event_rx),
            connection_task: Some(handle),
        })
    }

    /// Take the event stream. Returns `None` after the first call.
    pub fn event_stream(&mut self) -> Option<WsEventStream> {
        self.event_rx.take().map(WsEventStream::new)
    }

    /// Subscribe to live candles for a pair.
    ///
    /// Validates the period against the supported set before any traffic.
    /// Subscribing to an already pending or active series is a no-op: the
    /// subscription table keeps a single entry and no duplicate control
    /// message is sent.
    pub async fn subscribe_candles(&self, pair: &str, period_secs: u32) -> WsResult<()> {
        let period = CandlePeriod::from_secs(period_secs)?;
        self.ensure_open().await?;
        self.subscribe(Subscription::candles(pair, period)).await
    }

    /// Subscribe to live trade executions for a pair. Same idempotence as
    /// [`subscribe_candles`](Self::subscribe_candles).
    pub async fn subscribe_trades(&self, pair: &str) -> WsResult<()> {
        self.ensure_open().await?;
        self.subscribe(Subscription::trades(pair)).await
    }

    async fn subscribe(&self, subscription: Subscription) -> WsResult<()> {
        let request = subscription.to_request();
        let routing_key = subscription.routing_key();

        if !self.subscriptions.write().await.register(subscription) {
            tracing::debug!(routing_key = %routing_key, "already subscribed, nothing to do");
            return Ok(());
        }

        tracing::debug!(routing_key = %routing_key, "subscribing");
        if let Err(e) = self.send_json(&request).await {
            // Keep the table truthful when the control message never left
            self.subscriptions.write().await.abort_pending(&routing_key);
            return Err(e);
        }
        Ok(())
    }

    /// Unsubscribe every candle subscription for a pair.
    ///
    /// Sends an unsubscribe control message per active channel, drops
    /// pending entries locally, and closes the connection once no
    /// subscriptions remain.
    pub async fn unsubscribe_candles(&mut self, pair: &str) -> WsResult<()> {
        self.unsubscribe(pair, true).await
    }

    /// Unsubscribe every trade subscription for a pair. Same teardown
    /// policy as [`unsubscribe_candles`](Self::unsubscribe_candles).
    pub async fn unsubscribe_trades(&mut self, pair: &str) -> WsResult<()> {
        self.unsubscribe(pair, false).await
    }

    async fn unsubscribe(&mut self, pair: &str, candles: bool) -> WsResult<()> {
        let chan_ids = self.subscriptions.write().await.remove_pair(pair, candles);

        for chan_id in chan_ids {
            tracing::debug!(pair, chan_id, "unsubscribing");
            self.send_json(&UnsubscribeRequest::new(chan_id)).await?;
        }

        // Tear the socket down once nobody needs it. The guard must be gone
        // before disconnect: the receive task takes the write lock on acks.
        let none_left = !self.subscriptions.read().await.has_subscriptions();
        if none_left {
            tracing::info!("last subscription removed, closing connection");
            self.disconnect().await?;
        }
        Ok(())
    }

    /// Disconnect from the streaming endpoint and stop the receive task.
    pub async fn disconnect(&mut self) -> WsResult<()> {
        *self.state.write().await = ConnectionState::Closing;

        let _ = self.cmd_tx.send(ConnectionCommand::Disconnect).await;
        if let Some(handle) = self.connection_task.take() {
            let _ = handle.await;
        }

        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    /// Get the current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Check if the connection is open
    pub async fn is_open(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    /// Number of pending plus active subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.subscription_count()
    }

    /// Get the WebSocket URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configuration
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    async fn ensure_open(&self) -> WsResult<()> {
        match *self.state.read().await {
            ConnectionState::Open => Ok(()),
            _ => Err(WebSocketError::NotConnected),
        }
    }

    /// Send a JSON control message through the connection task.
    async fn send_json<T: serde::Serialize>(&self, msg: &T) -> WsResult<()> {
        let json = serde_json::to_string(msg)?;
        self.cmd_tx
            .send(ConnectionCommand::Send(json))
            .await
            .map_err(|_| WebSocketError::ChannelClosed)
    }
}

/// Connection task: sole reader of the socket, writer for control messages.
///
/// Runs until the remote closes, a transport error occurs, or a
/// [`ConnectionCommand::Disconnect`] arrives; every exit path leaves the
/// shared state at `Disconnected`.
async fn connection_task(
    mut sink: WsSink,
    mut source: WsSource,
    mut cmd_rx: mpsc::Receiver<ConnectionCommand>,
    handler: MessageHandler,
    event_tx: mpsc::Sender<WsEvent>,
    state: Arc<RwLock<ConnectionState>>,
) {
    loop {
        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let events = handler.handle_message(text.as_str()).await;
                        for event in events {
                            // try_send keeps a slow consumer from blocking the reader
                            match event_tx.try_send(event) {
                                Ok(_) => {}
                                Err(mpsc::error::TrySendError::Full(dropped_event)) => {
                                    tracing::warn!(
                                        "event channel full, dropping event: {:?}",
                                        std::mem::discriminant(&dropped_event)
                                    );
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    tracing::debug!("event receiver dropped");
                                    *state.write().await = ConnectionState::Disconnected;
                                    return;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("failed to send pong: {e}");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .as_ref()
                            .map(|f| format!("code: {}, reason: {}", f.code, f.reason))
                            .unwrap_or_else(|| "no reason".to_string());
                        tracing::info!("websocket closed by remote: {reason}");
                        let _ = event_tx.send(WsEvent::Disconnected { reason }).await;
                        *state.write().await = ConnectionState::Disconnected;
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary and raw frames are not part of the protocol
                    }
                    Some(Err(e)) => {
                        tracing::error!("websocket error: {e}");
                        let _ = event_tx.send(WsEvent::Error {
                            error: WebSocketError::from(e),
                        }).await;
                        let _ = event_tx.send(WsEvent::Disconnected {
                            reason: "read failure".to_string(),
                        }).await;
                        *state.write().await = ConnectionState::Disconnected;
                        return;
                    }
                    None => {
                        tracing::info!("websocket stream ended");
                        let _ = event_tx.send(WsEvent::Disconnected {
                            reason: "stream ended".to_string(),
                        }).await;
                        *state.write().await = ConnectionState::Disconnected;
                        return;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ConnectionCommand::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::error!("failed to send message: {e}");
                            let _ = event_tx.send(WsEvent::Error {
                                error: WebSocketError::SendFailed(e.to_string()),
                            }).await;
                            let _ = event_tx.send(WsEvent::Disconnected {
                                reason: "send failure".to_string(),
                            }).await;
                            *state.write().await = ConnectionState::Disconnected;
                            return;
                        }
                    }
                    Some(ConnectionCommand::Disconnect) => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::Normal,
                            reason: "client disconnect".into(),
                        }))).await;
                        *state.write().await = ConnectionState::Disconnected;
                        return;
                    }
                    None => {
                        // Client dropped
                        *state.write().await = ConnectionState::Disconnected;
                        return;
                    }
                }
            }
        }
    }
}

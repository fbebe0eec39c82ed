//! Market-data connector facade.
//!
//! [`MarketDataConnector`] is the capability interface: stateless REST
//! queries on one side, streaming subscriptions with observer channels on
//! the other. [`BitfinexConnector`] implements it over one
//! [`BitfinexApiClient`] and at most one live WebSocket connection, with
//! connect/subscribe/unsubscribe sequences serialized behind a mutex.

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::api::{ApiResult, BitfinexApiClient, CandleHistoryParams};
use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};
use crate::shared::{Candle, CandlePeriod, Ticker, Trade, TradeSide};
use crate::websocket::{
    BitfinexWebSocketClient, WebSocketConfig, WsEvent, WsEventStream, WsResult,
};

/// Capacity of each observer broadcast channel.
const OBSERVER_CHANNEL_CAPACITY: usize = 256;

/// Capability interface of an exchange market-data connector.
///
/// REST methods are stateless, one request per call. Streaming methods
/// share one connection per connector; events reach observers through the
/// broadcast receivers returned by the accessor methods (subscribing a
/// receiver adds an observer, dropping it removes one).
#[async_trait]
pub trait MarketDataConnector: Send + Sync {
    /// Fetch historical candles.
    async fn get_candle_series(&self, params: CandleHistoryParams) -> ApiResult<Vec<Candle>>;

    /// Fetch the most recent trades, newest first.
    async fn get_new_trades(&self, pair: &str, max_count: u32) -> ApiResult<Vec<Trade>>;

    /// Fetch a ticker snapshot.
    async fn get_ticker(&self, pair: &str) -> ApiResult<Ticker>;

    /// Start streaming live candles for a pair; connects on first use.
    async fn subscribe_candles(&self, pair: &str, period_secs: u32) -> WsResult<()>;

    /// Start streaming live trades for a pair; connects on first use.
    async fn subscribe_trades(&self, pair: &str) -> WsResult<()>;

    /// Stop streaming candles for a pair; closes the connection when no
    /// subscription of any kind remains.
    async fn unsubscribe_candles(&self, pair: &str) -> WsResult<()>;

    /// Stop streaming trades for a pair; same teardown policy.
    async fn unsubscribe_trades(&self, pair: &str) -> WsResult<()>;

    /// Observer channel for live candle updates.
    fn candle_updates(&self) -> broadcast::Receiver<Candle>;

    /// Observer channel for executed buy trades.
    fn buy_trades(&self) -> broadcast::Receiver<Trade>;

    /// Observer channel for executed sell trades.
    fn sell_trades(&self) -> broadcast::Receiver<Trade>;

    /// Observer channel for every streaming event, including connection
    /// lifecycle and error events.
    fn events(&self) -> broadcast::Receiver<WsEvent>;
}

/// Observer channels fanned out by the dispatch task.
#[derive(Clone)]
struct ObserverChannels {
    candle_tx: broadcast::Sender<Candle>,
    buy_tx: broadcast::Sender<Trade>,
    sell_tx: broadcast::Sender<Trade>,
    event_tx: broadcast::Sender<WsEvent>,
}

impl ObserverChannels {
    fn new() -> Self {
        let (candle_tx, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        let (buy_tx, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        let (sell_tx, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        Self {
            candle_tx,
            buy_tx,
            sell_tx,
            event_tx,
        }
    }
}

/// A subscribe operation applied once the connection is ensured.
enum SubscribeOp<'a> {
    Candles { pair: &'a str, period_secs: u32 },
    Trades { pair: &'a str },
}

/// One live streaming connection plus the task fanning its events out.
struct StreamingConnection {
    client: BitfinexWebSocketClient,
    dispatch: tokio::task::JoinHandle<()>,
}

/// Bitfinex implementation of [`MarketDataConnector`].
pub struct BitfinexConnector {
    api: BitfinexApiClient,
    ws_url: String,
    ws_config: WebSocketConfig,
    streaming: Mutex<Option<StreamingConnection>>,
    observers: ObserverChannels,
}

impl BitfinexConnector {
    /// Create a connector against the public Bitfinex endpoints.
    pub fn new() -> ApiResult<Self> {
        Self::with_urls(DEFAULT_API_URL, DEFAULT_WS_URL)
    }

    /// Create a connector against custom endpoints.
    pub fn with_urls(api_url: impl Into<String>, ws_url: impl Into<String>) -> ApiResult<Self> {
        Ok(Self {
            api: BitfinexApiClient::new(api_url)?,
            ws_url: ws_url.into(),
            ws_config: WebSocketConfig::default(),
            streaming: Mutex::new(None),
            observers: ObserverChannels::new(),
        })
    }

    /// Override the streaming configuration.
    pub fn with_ws_config(mut self, config: WebSocketConfig) -> Self {
        self.ws_config = config;
        self
    }

    /// The underlying REST client.
    pub fn api(&self) -> &BitfinexApiClient {
        &self.api
    }

    /// Close the streaming connection, if any, and stop the dispatch task.
    /// REST methods are unaffected.
    pub async fn close(&self) -> WsResult<()> {
        let mut slot = self.streaming.lock().await;
        if let Some(mut connection) = slot.take() {
            connection.client.disconnect().await?;
            let _ = connection.dispatch.await;
        }
        Ok(())
    }

    /// Apply a subscribe operation to the live streaming connection,
    /// connecting first if none exists or the previous one died.
    async fn subscribe_streaming(&self, op: SubscribeOp<'_>) -> WsResult<()> {
        let mut slot = self.streaming.lock().await;

        let needs_connect = match slot.as_ref() {
            Some(connection) => !connection.client.is_open().await,
            None => true,
        };
        if needs_connect {
            if let Some(stale) = slot.take() {
                let _ = stale.dispatch.await;
            }
            let mut client =
                BitfinexWebSocketClient::connect(&self.ws_url, self.ws_config.clone()).await?;
            let events = client
                .event_stream()
                .expect("event stream already taken on a fresh client");
            let dispatch = tokio::spawn(dispatch_events(events, self.observers.clone()));
            *slot = Some(StreamingConnection { client, dispatch });
        }

        let connection = slot.as_mut().expect("streaming connection just ensured");
        match op {
            SubscribeOp::Candles { pair, period_secs } => {
                connection.client.subscribe_candles(pair, period_secs).await
            }
            SubscribeOp::Trades { pair } => connection.client.subscribe_trades(pair).await,
        }
    }

    /// Remove subscriptions for a pair without connecting first.
    async fn unsubscribe(&self, pair: &str, candles: bool) -> WsResult<()> {
        let mut slot = self.streaming.lock().await;
        let Some(connection) = slot.as_mut() else {
            // Nothing is streaming; nothing to remove
            return Ok(());
        };

        let result = if candles {
            connection.client.unsubscribe_candles(pair).await
        } else {
            connection.client.unsubscribe_trades(pair).await
        };

        if !connection.client.is_open().await {
            if let Some(connection) = slot.take() {
                let _ = connection.dispatch.await;
            }
        }
        result
    }
}

#[async_trait]
impl MarketDataConnector for BitfinexConnector {
    async fn get_candle_series(&self, params: CandleHistoryParams) -> ApiResult<Vec<Candle>> {
        self.api.get_candle_series(params).await
    }

    async fn get_new_trades(&self, pair: &str, max_count: u32) -> ApiResult<Vec<Trade>> {
        self.api.get_new_trades(pair, max_count).await
    }

    async fn get_ticker(&self, pair: &str) -> ApiResult<Ticker> {
        self.api.get_ticker(pair).await
    }

    async fn subscribe_candles(&self, pair: &str, period_secs: u32) -> WsResult<()> {
        // Reject a bad period before touching the connection
        CandlePeriod::from_secs(period_secs)?;
        self.subscribe_streaming(SubscribeOp::Candles { pair, period_secs })
            .await
    }

    async fn subscribe_trades(&self, pair: &str) -> WsResult<()> {
        self.subscribe_streaming(SubscribeOp::Trades { pair }).await
    }

    async fn unsubscribe_candles(&self, pair: &str) -> WsResult<()> {
        self.unsubscribe(pair, true).await
    }

    async fn unsubscribe_trades(&self, pair: &str) -> WsResult<()> {
        self.unsubscribe(pair, false).await
    }

    fn candle_updates(&self) -> broadcast::Receiver<Candle> {
        self.observers.candle_tx.subscribe()
    }

    fn buy_trades(&self) -> broadcast::Receiver<Trade> {
        self.observers.buy_tx.subscribe()
    }

    fn sell_trades(&self) -> broadcast::Receiver<Trade> {
        self.observers.sell_tx.subscribe()
    }

    fn events(&self) -> broadcast::Receiver<WsEvent> {
        self.observers.event_tx.subscribe()
    }
}

/// Fan the websocket event stream out to the observer channels. Ends when
/// the connection task stops and the stream runs dry.
async fn dispatch_events(mut events: WsEventStream, observers: ObserverChannels) {
    while let Some(event) = events.recv().await {
        match &event {
            WsEvent::Candle { candle, .. } => {
                let _ = observers.candle_tx.send(candle.clone());
            }
            WsEvent::Trade { trade, .. } => {
                let tx = match trade.side {
                    TradeSide::Buy => &observers.buy_tx,
                    TradeSide::Sell => &observers.sell_tx,
                };
                let _ = tx.send(trade.clone());
            }
            _ => {}
        }
        // A send only fails when no observer is registered for the channel
        let _ = observers.event_tx.send(event);
    }
    tracing::debug!("event stream ended, dispatch task stopping");
}

//! Subscription management for WebSocket channels.
//!
//! Tracks the logical subscriptions multiplexed over one connection. A
//! subscription starts *pending* (subscribe sent, acknowledgment not yet
//! received) keyed by its routing key, and becomes *active* keyed by the
//! numeric channel id the exchange assigns in the `subscribed`
//! acknowledgment. Data frames are always routed by channel id.

use std::collections::HashMap;

use crate::shared::{candle_key, trading_symbol, CandlePeriod};
use crate::websocket::types::SubscribeRequest;

/// Represents a subscription to a specific channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// Candle series for a pair and period
    Candles { pair: String, period: CandlePeriod },
    /// Executed trades for a pair
    Trades { pair: String },
}

impl Subscription {
    /// Candle subscription for a pair (stored upper-cased).
    pub fn candles(pair: &str, period: CandlePeriod) -> Self {
        Self::Candles {
            pair: pair.to_uppercase(),
            period,
        }
    }

    /// Trade subscription for a pair (stored upper-cased).
    pub fn trades(pair: &str) -> Self {
        Self::Trades {
            pair: pair.to_uppercase(),
        }
    }

    /// The pair this subscription is for.
    pub fn pair(&self) -> &str {
        match self {
            Self::Candles { pair, .. } => pair,
            Self::Trades { pair } => pair,
        }
    }

    /// The key the exchange echoes back in the `subscribed` acknowledgment:
    /// the channel key for candles, the trading symbol for trades.
    pub fn routing_key(&self) -> String {
        match self {
            Self::Candles { pair, period } => candle_key(*period, pair),
            Self::Trades { pair } => trading_symbol(pair),
        }
    }

    /// Convert to the subscribe control message.
    pub fn to_request(&self) -> SubscribeRequest {
        match self {
            Self::Candles { .. } => SubscribeRequest::candles(self.routing_key()),
            Self::Trades { .. } => SubscribeRequest::trades(self.routing_key()),
        }
    }

    pub fn is_candles(&self) -> bool {
        matches!(self, Self::Candles { .. })
    }

    pub fn is_trades(&self) -> bool {
        matches!(self, Self::Trades { .. })
    }
}

/// Manages the pending and active subscription tables for one connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribe sent, acknowledgment pending (routing key → subscription)
    pending: HashMap<String, Subscription>,
    /// Acknowledged channels (channel id → subscription)
    active: HashMap<u64, Subscription>,
}

impl SubscriptionManager {
    /// Create a new subscription manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription before sending the control message.
    ///
    /// Returns `false` when the routing key is already pending or active:
    /// the caller must not send a duplicate subscribe message.
    pub fn register(&mut self, subscription: Subscription) -> bool {
        let key = subscription.routing_key();
        if self.pending.contains_key(&key)
            || self.active.values().any(|s| s.routing_key() == key)
        {
            return false;
        }
        self.pending.insert(key, subscription);
        true
    }

    /// Drop a pending subscription whose subscribe message never left.
    pub fn abort_pending(&mut self, routing_key: &str) -> Option<Subscription> {
        self.pending.remove(routing_key)
    }

    /// Activate a pending subscription once the `subscribed` acknowledgment
    /// arrives. Returns the subscription now routed by `chan_id`, or `None`
    /// when nothing pending matches the acknowledged key.
    pub fn confirm(&mut self, routing_key: &str, chan_id: u64) -> Option<Subscription> {
        let subscription = self.pending.remove(routing_key)?;
        self.active.insert(chan_id, subscription.clone());
        Some(subscription)
    }

    /// Look up the active subscription for a data frame's channel id.
    pub fn resolve(&self, chan_id: u64) -> Option<&Subscription> {
        self.active.get(&chan_id)
    }

    /// Remove every subscription of the given kind matching a pair.
    ///
    /// Returns the channel ids that were active and now need an unsubscribe
    /// control message; matching pending entries are dropped without wire
    /// traffic (no channel id exists for them yet).
    pub fn remove_pair(&mut self, pair: &str, candles: bool) -> Vec<u64> {
        let pair = pair.to_uppercase();
        let matches = |s: &Subscription| s.pair() == pair && s.is_candles() == candles;

        self.pending.retain(|_, s| !matches(s));

        let chan_ids: Vec<u64> = self
            .active
            .iter()
            .filter(|(_, s)| matches(s))
            .map(|(id, _)| *id)
            .collect();
        for id in &chan_ids {
            self.active.remove(id);
        }
        chan_ids
    }

    /// Remove an active subscription by channel id (unsubscribed ack).
    pub fn remove(&mut self, chan_id: u64) -> Option<Subscription> {
        self.active.remove(&chan_id)
    }

    /// Whether a routing key is currently pending or active.
    pub fn is_subscribed(&self, routing_key: &str) -> bool {
        self.pending.contains_key(routing_key)
            || self.active.values().any(|s| s.routing_key() == routing_key)
    }

    /// Check if there are any pending or active subscriptions
    pub fn has_subscriptions(&self) -> bool {
        !self.pending.is_empty() || !self.active.is_empty()
    }

    /// Get count of pending plus active subscriptions
    pub fn subscription_count(&self) -> usize {
        self.pending.len() + self.active.len()
    }

    /// Clear all subscriptions
    pub fn clear(&mut self) {
        self.pending.clear();
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_keys() {
        let candles = Subscription::candles("btcusd", CandlePeriod::OneMinute);
        assert_eq!(candles.routing_key(), "trade:1m:tBTCUSD");

        let trades = Subscription::trades("btcusd");
        assert_eq!(trades.routing_key(), "tBTCUSD");
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut manager = SubscriptionManager::new();

        assert!(manager.register(Subscription::candles("btcusd", CandlePeriod::OneMinute)));
        // Same key again, even with different input casing
        assert!(!manager.register(Subscription::candles("BTCUSD", CandlePeriod::OneMinute)));
        assert_eq!(manager.subscription_count(), 1);

        // Still a duplicate after the acknowledgment activates it
        manager.confirm("trade:1m:tBTCUSD", 42);
        assert!(!manager.register(Subscription::candles("btcusd", CandlePeriod::OneMinute)));
        assert_eq!(manager.subscription_count(), 1);
    }

    #[test]
    fn test_distinct_periods_are_distinct_subscriptions() {
        let mut manager = SubscriptionManager::new();

        assert!(manager.register(Subscription::candles("btcusd", CandlePeriod::OneMinute)));
        assert!(manager.register(Subscription::candles("btcusd", CandlePeriod::FiveMinutes)));
        assert_eq!(manager.subscription_count(), 2);
    }

    #[test]
    fn test_confirm_activates_chan_id_routing() {
        let mut manager = SubscriptionManager::new();
        manager.register(Subscription::candles("btcusd", CandlePeriod::OneMinute));

        assert!(manager.resolve(343351).is_none());
        let confirmed = manager.confirm("trade:1m:tBTCUSD", 343351).unwrap();
        assert_eq!(confirmed.pair(), "BTCUSD");

        let resolved = manager.resolve(343351).unwrap();
        assert!(resolved.is_candles());
    }

    #[test]
    fn test_confirm_unknown_key_is_none() {
        let mut manager = SubscriptionManager::new();
        assert!(manager.confirm("trade:1m:tBTCUSD", 1).is_none());
    }

    #[test]
    fn test_remove_pair_returns_active_chan_ids() {
        let mut manager = SubscriptionManager::new();
        manager.register(Subscription::candles("btcusd", CandlePeriod::OneMinute));
        manager.register(Subscription::candles("btcusd", CandlePeriod::FiveMinutes));
        manager.register(Subscription::trades("btcusd"));
        manager.confirm("trade:1m:tBTCUSD", 1);
        manager.confirm("tBTCUSD", 2);
        // trade:5m:tBTCUSD stays pending

        let mut chan_ids = manager.remove_pair("btcusd", true);
        chan_ids.sort_unstable();
        assert_eq!(chan_ids, vec![1]);

        // The trades subscription is untouched, both candle entries are gone
        assert!(manager.is_subscribed("tBTCUSD"));
        assert!(!manager.is_subscribed("trade:1m:tBTCUSD"));
        assert!(!manager.is_subscribed("trade:5m:tBTCUSD"));
        assert_eq!(manager.subscription_count(), 1);
    }

    #[test]
    fn test_last_removal_empties_table() {
        let mut manager = SubscriptionManager::new();
        manager.register(Subscription::trades("btcusd"));
        manager.confirm("tBTCUSD", 7);

        assert!(manager.has_subscriptions());
        assert_eq!(manager.remove_pair("btcusd", false), vec![7]);
        assert!(!manager.has_subscriptions());
    }

    #[test]
    fn test_clear() {
        let mut manager = SubscriptionManager::new();
        manager.register(Subscription::candles("btcusd", CandlePeriod::OneMinute));
        manager.register(Subscription::trades("ethusd"));
        manager.clear();
        assert!(!manager.has_subscriptions());
        assert_eq!(manager.subscription_count(), 0);
    }
}

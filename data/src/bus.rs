//! Bus-side subscriber hooks (spec.md §4.2, §6.1).
//!
//! The original's `AMQPSubscriber` (`modules/amqp/pubsub.py`) binds a topic
//! exchange, declares an auto-delete queue, and ACKs each message only after
//! its callback completes — logging (not propagating) a callback failure so
//! one bad derived update never blocks the queue. This module keeps that
//! shape over a process-local topic exchange: [`TopicBus`] is the
//! publish/subscribe backbone every [`kestrel_core`](../../core) process
//! binds to, and [`BusConsumer`] is the hook vocabulary a subscriber
//! implements.

use kestrel_markets::Symbol;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, warn};

/// Wire envelope for every message on the bus (spec.md §6.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub routing_key: String,
    pub action: String,
    pub payload: Option<serde_json::Value>,
}

impl BusMessage {
    pub fn alive() -> Self {
        Self {
            routing_key: "alive".into(),
            action: "alive".into(),
            payload: None,
        }
    }

    pub fn reset() -> Self {
        Self {
            routing_key: "reset".into(),
            action: "reset".into(),
            payload: None,
        }
    }

    pub fn update(symbol: &Symbol, entity: &str, data: serde_json::Value) -> Self {
        Self {
            routing_key: format!("{symbol}.{entity}"),
            action: "update".into(),
            payload: Some(serde_json::json!({ "entity": entity, "symbol": symbol.as_str(), "data": data })),
        }
    }
}

/// Subscriber-side hooks a bus consumer implements (spec.md §4.2). All three
/// default to no-ops so an implementor only overrides what it cares about.
#[async_trait::async_trait]
pub trait BusConsumer: Send {
    /// Fired after the underlying transport reconnects. Consumers treat this
    /// the same as [`BusConsumer::reset`] (spec.md §4.2 "fires `reconnect`
    /// (which consumers treat as `reset`)").
    async fn reconnect(&mut self) {
        self.reset().await;
    }

    /// "Drop all derived state, re-snapshot" (spec.md §4.1).
    async fn reset(&mut self) {}

    async fn update(&mut self, entity: &str, symbol: &Symbol, data: serde_json::Value) {
        let _ = (entity, symbol, data);
    }
}

/// A non-durable topic exchange: publishers broadcast [`BusMessage`]s,
/// subscribers bind an auto-delete queue (in practice, a fresh broadcast
/// receiver) to a set of routing-key patterns.
#[derive(Debug, Clone)]
pub struct TopicBus {
    sender: broadcast::Sender<BusMessage>,
}

impl TopicBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::Sender::new(capacity),
        }
    }

    pub fn publish(&self, message: BusMessage) {
        // Fire-and-forget (spec.md §4.1): no subscribers is not an error.
        let _ = self.sender.send(message);
    }

    pub fn subscribe(&self, bindings: Vec<String>) -> BoundQueue {
        BoundQueue {
            receiver: self.sender.subscribe(),
            bindings,
        }
    }
}

/// An exclusive, auto-delete queue bound to a list of routing-key patterns
/// (spec.md §4.2 "declares an auto-delete queue, binds to a list of routing
/// keys"). AMQP topic syntax: `*` matches exactly one dot-separated word,
/// `#` matches zero or more.
#[derive(Debug)]
pub struct BoundQueue {
    receiver: broadcast::Receiver<BusMessage>,
    bindings: Vec<String>,
}

impl BoundQueue {
    fn matches(&self, routing_key: &str) -> bool {
        self.bindings
            .iter()
            .any(|pattern| topic_match(pattern, routing_key))
    }

    /// Drains the queue, dispatching matching messages to `consumer`'s hooks
    /// with per-message ACK-on-completion semantics: a hook that fails (by
    /// panicking its `Future`... in practice by returning having logged its
    /// own error) is still considered ACKed, same as the original.
    pub async fn run(mut self, consumer: &mut impl BusConsumer) {
        while self.dispatch_next(consumer).await {}
    }

    /// Consumes and dispatches exactly one matching message, returning
    /// `false` once the underlying channel is closed. Lets a caller
    /// interleave a shutdown check between messages (spec.md §5 "Critical
    /// feed lag"), which a plain [`BoundQueue::run`] cannot offer.
    pub async fn dispatch_next(&mut self, consumer: &mut impl BusConsumer) -> bool {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.matches(&message.routing_key) => {
                    self.dispatch(consumer, message).await;
                    return true;
                }
                Ok(_unmatched) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "bus consumer lagged, forcing reset");
                    consumer.reset().await;
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }

    async fn dispatch(&self, consumer: &mut impl BusConsumer, message: BusMessage) {
        match message.action.as_str() {
            "alive" => {}
            "reset" => consumer.reset().await,
            "update" => {
                let Some(payload) = message.payload else {
                    error!(routing_key = %message.routing_key, "update message missing payload");
                    return;
                };
                let (entity, symbol, data) = match (
                    payload.get("entity").and_then(|v| v.as_str()),
                    payload.get("symbol").and_then(|v| v.as_str()),
                    payload.get("data").cloned(),
                ) {
                    (Some(entity), Some(symbol), Some(data)) => (entity, symbol, data),
                    _ => {
                        error!(routing_key = %message.routing_key, "malformed update payload");
                        return;
                    }
                };
                consumer.update(entity, &Symbol::new(symbol), data).await;
            }
            other => warn!(action = other, "unrecognised bus action"),
        }
    }
}

fn topic_match(pattern: &str, routing_key: &str) -> bool {
    let pattern_words: Vec<&str> = pattern.split('.').collect();
    let key_words: Vec<&str> = routing_key.split('.').collect();
    topic_match_words(&pattern_words, &key_words)
}

fn topic_match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some(("#", rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=key.len()).any(|i| topic_match_words(rest, &key[i..]))
        }
        Some(("*", rest)) => !key.is_empty() && topic_match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && topic_match_words(rest, &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_key_matches_literal_pattern() {
        assert!(topic_match("btcusdt.trade", "btcusdt.trade"));
        assert!(!topic_match("btcusdt.trade", "btcusdt.book"));
    }

    #[test]
    fn star_matches_single_word() {
        assert!(topic_match("*.trade", "btcusdt.trade"));
        assert!(!topic_match("*.trade", "a.b.trade"));
    }

    #[test]
    fn hash_matches_any_suffix() {
        assert!(topic_match("btcusdt.#", "btcusdt.trade"));
        assert!(topic_match("#", "btcusdt.trade.extra"));
        assert!(topic_match("#", ""));
    }

    #[derive(Default)]
    struct RecordingConsumer {
        resets: u32,
        updates: Vec<(String, String)>,
    }

    #[async_trait::async_trait]
    impl BusConsumer for RecordingConsumer {
        async fn reset(&mut self) {
            self.resets += 1;
        }

        async fn update(&mut self, entity: &str, symbol: &Symbol, _data: serde_json::Value) {
            self.updates.push((entity.to_string(), symbol.to_string()));
        }
    }

    #[tokio::test]
    async fn reconnect_defaults_to_reset() {
        let mut consumer = RecordingConsumer::default();
        consumer.reconnect().await;
        assert_eq!(consumer.resets, 1);
    }

    #[tokio::test]
    async fn bound_queue_dispatches_only_matching_keys() {
        let bus = TopicBus::new(16);
        let queue = bus.subscribe(vec!["btcusdt.#".into()]);

        bus.publish(BusMessage::update(
            &Symbol::new("btcusdt"),
            "trade",
            serde_json::json!({"price": "1"}),
        ));
        bus.publish(BusMessage::update(
            &Symbol::new("ethusdt"),
            "trade",
            serde_json::json!({"price": "1"}),
        ));
        drop(bus);

        let mut consumer = RecordingConsumer::default();
        // `run` loops forever on an open channel; here the sender is dropped
        // so the channel closes once drained, and `run` returns.
        queue.run(&mut consumer).await;

        assert_eq!(consumer.updates, vec![("trade".to_string(), "btcusdt".to_string())]);
    }
}

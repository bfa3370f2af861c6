//! `FeedPublisher`: the single-venue-WebSocket normalizer (spec.md §4.1),
//! grounded on `services/feed_publisher/publisher.py`.
//!
//! This crate does not know how to speak the venue's wire protocol (spec.md
//! §1 keeps that out of the core); [`VenuePublicStream`] is the narrow
//! collaborator [`kestrel_execution`](../../execution)'s real venue client
//! implements. `FeedPublisher` only normalizes, de-duplicates, and relays.

use crate::books::BookCache;
use crate::bus::{BusMessage, TopicBus};
use crate::event::{BookUpdate, DepthUpdate, TradeUpdate};
use kestrel_integration::backoff::Backoff;
use kestrel_markets::Symbol;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Liveness watchdog: no message for this long means the socket is dead
/// (spec.md §4.1 "Receive-timeout on the socket is the liveness watchdog").
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Alive tick interval (spec.md §4.1 "Every 30 s: publish `alive`").
pub const ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Skew thresholds (spec.md §4.1 "Local-vs-event-time skew").
pub const SKEW_WARN_MS: i64 = 5_000;
pub const SKEW_RESET_MS: i64 = 30_000;

/// One normalized update observed on the venue's public stream, already
/// carrying the receive-time wall clock stamped by the adapter.
#[derive(Clone, Debug, PartialEq)]
pub enum VenueStreamEvent {
    Trade {
        symbol: Symbol,
        exchange_time: i64,
        received_time: i64,
        data: TradeUpdate,
    },
    Book {
        symbol: Symbol,
        exchange_time: i64,
        received_time: i64,
        data: BookUpdate,
    },
    Depth {
        symbol: Symbol,
        exchange_time: i64,
        received_time: i64,
        data: DepthUpdate,
    },
}

/// The narrow venue-facing collaborator a `FeedPublisher` drives (spec.md
/// §6.3 "Public stream"). A real implementation owns the WebSocket; this
/// crate only needs `connect`/`recv`.
#[async_trait::async_trait]
pub trait VenuePublicStream: Send {
    /// (Re)connects and subscribes to `{symbol}@aggTrade`, `{symbol}@bookTicker`,
    /// `{symbol}@depth` for every configured symbol (spec.md §4.1 `start()`),
    /// blocking until subscription is confirmed.
    async fn connect(&mut self, symbols: &[Symbol]) -> Result<(), kestrel_integration::error::SocketError>;

    /// Waits up to `timeout` for the next normalized event.
    async fn recv(
        &mut self,
        timeout: Duration,
    ) -> Result<VenueStreamEvent, kestrel_integration::error::SocketError>;
}

/// Normalizes a venue public stream into bus messages (spec.md §4.1).
pub struct FeedPublisher<S> {
    stream: S,
    symbols: Vec<Symbol>,
    bus: Arc<TopicBus>,
    books: Arc<BookCache>,
    backoff: Backoff,
}

impl<S: VenuePublicStream> FeedPublisher<S> {
    pub fn new(stream: S, symbols: Vec<Symbol>, bus: Arc<TopicBus>, books: Arc<BookCache>) -> Self {
        Self {
            stream,
            symbols,
            bus,
            books,
            backoff: Backoff::reconnect(),
        }
    }

    /// Runs forever: connect, relay, reconnect-on-failure. Never returns
    /// under normal operation; bubbles up only if the caller wants to stop
    /// the process (SIGINT/SIGTERM handling lives one level up, spec.md §5).
    pub async fn run(mut self) -> ! {
        loop {
            if let Err(err) = self.stream.connect(&self.symbols).await {
                warn!(error = %err, "feed publisher connect failed, backing off");
                tokio::time::sleep(self.backoff.next_delay()).await;
                continue;
            }

            info!("feed publisher connected, publishing reset");
            self.backoff.reset();
            // spec.md §4.1: publish `reset` before any subsequent update.
            self.bus.publish(BusMessage::reset());
            self.books.clear();

            self.relay_until_disconnected().await;
            warn!("feed publisher disconnected, reconnecting");
        }
    }

    async fn relay_until_disconnected(&mut self) {
        let mut next_alive = tokio::time::Instant::now() + ALIVE_INTERVAL;
        loop {
            if tokio::time::Instant::now() >= next_alive {
                self.bus.publish(BusMessage::alive());
                next_alive = tokio::time::Instant::now() + ALIVE_INTERVAL;
            }

            match self.stream.recv(RECEIVE_TIMEOUT).await {
                Ok(event) => self.handle_event(event),
                Err(err) => {
                    error!(error = %err, "feed publisher receive failed, reconnecting");
                    return;
                }
            }
        }
    }

    fn handle_event(&self, event: VenueStreamEvent) {
        let (symbol, exchange_time, received_time) = match &event {
            VenueStreamEvent::Trade {
                symbol,
                exchange_time,
                received_time,
                ..
            }
            | VenueStreamEvent::Book {
                symbol,
                exchange_time,
                received_time,
                ..
            }
            | VenueStreamEvent::Depth {
                symbol,
                exchange_time,
                received_time,
                ..
            } => (symbol.clone(), *exchange_time, *received_time),
        };

        let skew = received_time - exchange_time;
        if skew >= SKEW_RESET_MS {
            warn!(symbol = %symbol, skew_ms = skew, "feed event skew forces reset");
            self.bus.publish(BusMessage::reset());
            self.books.clear();
            return;
        } else if skew >= SKEW_WARN_MS {
            warn!(symbol = %symbol, skew_ms = skew, "feed event skew warning");
        }

        match event {
            VenueStreamEvent::Trade { symbol, data, .. } => {
                self.publish(&symbol, "trade", serde_json::to_value(data).unwrap());
            }
            VenueStreamEvent::Book { symbol, data, .. } => {
                // spec.md §4.1: de-duplicated, only publish on change.
                if self.books.set(symbol.clone(), data) {
                    self.publish(&symbol, "book", serde_json::to_value(data).unwrap());
                }
            }
            VenueStreamEvent::Depth { symbol, data, .. } => {
                self.publish(&symbol, "depth", serde_json::to_value(data).unwrap());
            }
        }
    }

    fn publish(&self, symbol: &Symbol, entity: &str, data: serde_json::Value) {
        self.bus.publish(BusMessage::update(symbol, entity, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_integration::error::SocketError;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedStream {
        events: Mutex<VecDeque<Result<VenueStreamEvent, SocketError>>>,
        connect_calls: Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl VenuePublicStream for ScriptedStream {
        async fn connect(&mut self, _symbols: &[Symbol]) -> Result<(), SocketError> {
            *self.connect_calls.lock().unwrap() += 1;
            Ok(())
        }

        async fn recv(&mut self, _timeout: Duration) -> Result<VenueStreamEvent, SocketError> {
            self.events
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(SocketError::ReceiveTimeout))
        }
    }

    #[derive(Default)]
    struct RecordingConsumer {
        resets: u32,
        updates: u32,
    }

    #[async_trait::async_trait]
    impl crate::bus::BusConsumer for RecordingConsumer {
        async fn reset(&mut self) {
            self.resets += 1;
        }

        async fn update(&mut self, _entity: &str, _symbol: &Symbol, _data: serde_json::Value) {
            self.updates += 1;
        }
    }

    #[tokio::test]
    async fn publishes_reset_then_book_update_once_on_change() {
        let symbol = Symbol::new("btcusdt");
        let events = VecDeque::from(vec![
            Ok(VenueStreamEvent::Book {
                symbol: symbol.clone(),
                exchange_time: 0,
                received_time: 0,
                data: BookUpdate::new(dec!(10), dec!(11)),
            }),
            Ok(VenueStreamEvent::Book {
                symbol: symbol.clone(),
                exchange_time: 1,
                received_time: 1,
                data: BookUpdate::new(dec!(10), dec!(11)),
            }),
        ]);
        let stream = ScriptedStream {
            events: Mutex::new(events),
            connect_calls: Mutex::new(0),
        };

        let bus = Arc::new(TopicBus::new(16));
        let books = Arc::new(BookCache::new());
        let queue = bus.subscribe(vec!["#".into()]);

        let mut publisher = FeedPublisher::new(stream, vec![symbol.clone()], bus.clone(), books);
        // Drive one connect + two recv manually instead of `run()`'s infinite loop.
        publisher.stream.connect(&publisher.symbols).await.unwrap();
        bus.publish(BusMessage::reset());
        let first = publisher.stream.recv(RECEIVE_TIMEOUT).await.unwrap();
        publisher.handle_event(first);
        let second = publisher.stream.recv(RECEIVE_TIMEOUT).await.unwrap();
        publisher.handle_event(second);
        drop(bus);

        let mut consumer = RecordingConsumer::default();
        queue.run(&mut consumer).await;

        // reset + exactly one book update (the duplicate is suppressed).
        assert_eq!(consumer.resets, 1);
        assert_eq!(consumer.updates, 1);
    }

    #[test]
    fn skew_thresholds_match_spec() {
        assert_eq!(SKEW_WARN_MS, 5_000);
        assert_eq!(SKEW_RESET_MS, 30_000);
    }
}

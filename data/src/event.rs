//! The normalized event envelope every market update is wrapped in before it
//! reaches the bus (spec.md §3 `BookUpdate`/`TradeUpdate`/`DepthUpdate`, §6.1
//! wire shape).

use kestrel_markets::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single normalized update, tagged with the symbol and wall-clock receipt
/// time it was observed at (used for the feed-lag check, spec.md §5).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent<T> {
    pub symbol: Symbol,
    pub exchange_time: i64,
    pub received_time: i64,
    pub data: T,
}

impl<T> MarketEvent<T> {
    pub fn new(symbol: Symbol, exchange_time: i64, received_time: i64, data: T) -> Self {
        Self {
            symbol,
            exchange_time,
            received_time,
            data,
        }
    }

    /// Local-vs-event-time skew in milliseconds (spec.md §4.1 "Local-vs-event-
    /// time skew").
    pub fn skew_ms(&self) -> i64 {
        self.received_time - self.exchange_time
    }
}

/// The three entity kinds a [`FeedPublisher`](crate::feed::FeedPublisher)
/// relays, carried on the bus as `{symbol}.{entity}` (spec.md §6.1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum DataKind {
    Trade(TradeUpdate),
    Book(BookUpdate),
    Depth(DepthUpdate),
}

impl DataKind {
    pub fn entity_name(&self) -> &'static str {
        match self {
            DataKind::Trade(_) => "trade",
            DataKind::Book(_) => "book",
            DataKind::Depth(_) => "depth",
        }
    }
}

/// Best bid/ask snapshot (spec.md §3 `BookUpdate`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BookUpdate {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self { bid, ask }
    }

    /// Abnormal prices are ignored by trailing-stop evaluation (spec.md
    /// §4.6 "Abnormal prices").
    pub fn is_abnormal(&self) -> bool {
        self.bid <= Decimal::ZERO || self.ask <= Decimal::ZERO
    }
}

/// A single executed trade (spec.md §3 `TradeUpdate`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
    pub is_buyer_maker: bool,
}

/// One level-2 diff batch (spec.md §3 `DepthUpdate`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthUpdate {
    pub first_update_id: u64,
    pub last_update_id: u64,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub timestamp: i64,
}

//! `LocalStorage`: the in-memory cache of Positions and Orders a single
//! `Strategy` exclusively owns (spec.md §3 "Ownership"). The durable store
//! is authoritative across restarts; this cache is rebuilt at startup via
//! reconciliation (spec.md §4.8) and must never contradict the store
//! afterward.

use crate::model::{Order, OrderId, Position, PositionStatus};
use kestrel_markets::{PositionSide, Symbol};
use kestrel_store::Store;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct LocalStorage {
    strategy_id: String,
    symbols: HashSet<Symbol>,
    orders: HashMap<OrderId, Order>,
    positions: HashMap<(Symbol, PositionSide), Position>,
    /// Symbols marked busy by startup reconciliation (spec.md §4.8/§7
    /// "Reconciliation mismatch"): no new entries are emitted for these
    /// until an operator intervenes.
    busy: HashSet<Symbol>,
    order_store: Arc<dyn Store<Order>>,
    position_store: Arc<dyn Store<Position>>,
}

impl LocalStorage {
    pub fn new(
        strategy_id: String,
        symbols: Vec<Symbol>,
        order_store: Arc<dyn Store<Order>>,
        position_store: Arc<dyn Store<Position>>,
    ) -> Self {
        Self {
            strategy_id,
            symbols: symbols.into_iter().collect(),
            orders: HashMap::new(),
            positions: HashMap::new(),
            busy: HashSet::new(),
            order_store,
            position_store,
        }
    }

    pub fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    pub fn owns_symbol(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn mark_busy(&mut self, symbol: Symbol) {
        self.busy.insert(symbol);
    }

    pub fn is_busy(&self, symbol: &Symbol) -> bool {
        self.busy.contains(symbol)
    }

    pub fn get_order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn get_position(&self, symbol: &Symbol, side: PositionSide) -> Option<&Position> {
        self.positions.get(&(symbol.clone(), side))
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Seeds the cache at startup from reconciled records (spec.md §4.8
    /// "seed local storage with positions and orders").
    pub fn seed(&mut self, positions: Vec<Position>, orders: Vec<Order>) {
        for position in positions {
            self.positions.insert((position.symbol.clone(), position.side), position);
        }
        for order in orders {
            self.orders.insert(order.id.clone(), order);
        }
    }

    /// Inserts or replaces `position` in the cache, dropping it entirely if
    /// it has closed (spec.md §4.6 "drop local position and its orders from
    /// local storage").
    pub async fn upsert_position(&mut self, position: Position) -> Result<(), kestrel_store::StoreError> {
        self.position_store.upsert(vec![("id", bson::to_bson(&position.id).unwrap())], &position).await?;

        let key = (position.symbol.clone(), position.side);
        if matches!(position.status, PositionStatus::Closed) {
            self.positions.remove(&key);
            for order_id in &position.orders {
                self.orders.remove(order_id);
            }
        } else {
            self.positions.insert(key, position);
        }
        Ok(())
    }

    pub async fn upsert_order(&mut self, order: Order) -> Result<(), kestrel_store::StoreError> {
        self.order_store.upsert(vec![("id", bson::to_bson(&order.id).unwrap())], &order).await?;
        self.orders.insert(order.id.clone(), order);
        Ok(())
    }

    pub fn get_or_create_position(&mut self, symbol: &Symbol, side: PositionSide, timestamp: i64) -> Position {
        self.positions
            .get(&(symbol.clone(), side))
            .cloned()
            .unwrap_or_else(|| Position::new(symbol.clone(), side, self.strategy_id.clone(), timestamp))
    }
}

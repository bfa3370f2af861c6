//! `Position` (spec.md §3), the internal bookkeeping record a strategy
//! maintains across entry/exit fills. Grounded on `modules/models/position.py`.

use crate::model::order::{Order, OrderId};
use kestrel_markets::{OrderSide, PositionSide, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// spec.md §3 `Position (internal)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: Symbol,
    pub side: PositionSide,
    pub strategy_id: String,
    pub status: PositionStatus,
    /// Net open quantity: `Σ entry-filled − Σ exit-filled` (Invariant 1).
    pub quantity: Decimal,
    /// Cumulative quantity ever entered, never decremented (used as the
    /// denominator for take-profit ladder steps, spec.md §4.7).
    pub total_quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub orders: Vec<OrderId>,
    pub create_ts: i64,
    pub update_ts: i64,
}

impl Position {
    pub fn new(symbol: Symbol, side: PositionSide, strategy_id: String, timestamp: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            symbol,
            side,
            strategy_id,
            status: PositionStatus::Open,
            quantity: Decimal::ZERO,
            total_quantity: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            exit_price: Decimal::ZERO,
            orders: Vec::new(),
            create_ts: timestamp,
            update_ts: timestamp,
        }
    }

    /// True iff `order`'s side opens/adds to this position (spec.md §4.6
    /// "order's side is entry iff it matches the position's entry side —
    /// LONG<->BUY, SHORT<->SELL").
    pub fn is_entry_side(&self, order_side: OrderSide) -> bool {
        order_side == self.side.entry_order_side()
    }

    /// Applies one filled order to the position's accounting (spec.md §4.6
    /// "Position update on fill"), returning the recomputed
    /// quantity-weighted average price for whichever side the fill was on.
    ///
    /// Invariants maintained: Invariant 1 (`quantity = Σentry − Σexit`),
    /// Invariant 2 (`CLOSED iff quantity == 0`), Invariant 3 (weighted-mean
    /// entry/exit price).
    pub fn apply_fill(&mut self, order: &Order, timestamp: i64) {
        let fill_qty = order.filled_quantity;
        let fill_price = order.entry_price;

        if self.is_entry_side(order.side) {
            let prior_notional = self.entry_price * self.total_quantity;
            self.total_quantity += fill_qty;
            self.quantity += fill_qty;
            self.entry_price = if self.total_quantity.is_zero() {
                Decimal::ZERO
            } else {
                (prior_notional + fill_price * fill_qty) / self.total_quantity
            };
        } else {
            let exited_so_far = self.total_quantity - self.quantity;
            let prior_exit_notional = self.exit_price * exited_so_far;
            self.quantity -= fill_qty;
            let exited_after = exited_so_far + fill_qty;
            self.exit_price = if exited_after.is_zero() {
                Decimal::ZERO
            } else {
                (prior_exit_notional + fill_price * fill_qty) / exited_after
            };
            if self.quantity <= Decimal::ZERO {
                self.quantity = Decimal::ZERO;
                self.status = PositionStatus::Closed;
            }
        }

        if !self.orders.contains(&order.id) {
            self.orders.push(order.id.clone());
        }
        self.update_ts = timestamp;
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, PositionStatus::Closed)
    }
}

impl kestrel_store::Document for Position {
    type Id = String;
    const COLLECTION: &'static str = "positions";
    // spec.md §6.2 `PositionModel`: unique(id); (symbol, strategy_id, status, timestamp).
    const INDEXES: &'static [kestrel_store::IndexSpec] =
        &[&["symbol", "strategy_id", "status", "timestamp"]];

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}

//! `Order` (spec.md §3) and its lifecycle, grounded on
//! `modules/models/order.py`.

use kestrel_markets::{OrderSide, PositionSide, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Locally generated, 128-bit unique client order id (spec.md §3/Invariant 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(pub Uuid);

impl ClientOrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Venue-assigned order id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// spec.md §3 `Order.status`: `NEW -> (PARTIALLY_FILLED -> FILLED) | CANCELED
/// | REJECTED | EXPIRED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// True once the order can never transition again (spec.md §4.6
    /// `is_processed`).
    pub fn is_processed(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// True iff any quantity of the order has been filled (spec.md §4.6
    /// `is_filled`). `PartiallyFilled` fills are still "filled" in the sense
    /// that a Position update must account for their quantity.
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::PartiallyFilled | OrderStatus::Filled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodTilCanceled,
    ImmediateOrCancel,
    FillOrKill,
}

/// Free-form context carried from the `Command` that issued an order through
/// to the fill that attaches it to a Position (spec.md §4.6 `PlaceOrder{..,
/// context?}`).
pub type OrderContext = Option<serde_json::Value>;

/// spec.md §3 `Order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: ClientOrderId,
    pub position_id: Option<String>,
    pub symbol: Symbol,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub position_side: PositionSide,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub entry_price: Decimal,
    pub context: OrderContext,
    pub timestamp: i64,
}

impl Order {
    /// Partial-updates `self` with whichever fields of `patch` are present,
    /// leaving the rest untouched (spec.md §4.6 "partial-update the existing
    /// record with non-null fields").
    pub fn apply_patch(&mut self, patch: OrderPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(filled_quantity) = patch.filled_quantity {
            self.filled_quantity = filled_quantity;
        }
        if let Some(entry_price) = patch.entry_price {
            self.entry_price = entry_price;
        }
        if let Some(position_id) = patch.position_id {
            self.position_id = Some(position_id);
        }
    }
}

/// The subset of `Order` fields a user-stream order-trade-update event
/// carries; `None` fields are left unmodified on the existing record.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub filled_quantity: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub position_id: Option<String>,
}

impl kestrel_store::Document for Order {
    type Id = OrderId;
    const COLLECTION: &'static str = "orders";
    // spec.md §6.2 `OrderModel`: unique(id); (symbol, timestamp); (symbol, side, timestamp).
    const INDEXES: &'static [kestrel_store::IndexSpec] =
        &[&["symbol", "timestamp"], &["symbol", "side", "timestamp"]];

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}

//! Order/Position/Account data model (spec.md §3).

pub mod account;
pub mod order;
pub mod position;

pub use account::{Account, AccountPosition, AssetBalance, MarginType};
pub use order::{ClientOrderId, Order, OrderContext, OrderId, OrderPatch, OrderStatus, OrderType, TimeInForce};
pub use position::{Position, PositionStatus};

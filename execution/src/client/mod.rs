//! Venue adapter contract (spec.md §6.3): public/user REST, and the
//! user-stream event shape. The wire format itself is out of scope (spec.md
//! §1); this module only specifies the interface
//! [`crate::command::CommandHandler`] and [`kestrel_trader`](../../trader)
//! consume.

pub mod mock;

use crate::error::ExecutionError;
use crate::model::{Account, ClientOrderId, MarginType, Order, OrderId, OrderType, TimeInForce};
use kestrel_data::candles::Candle;
use kestrel_data::depth::DepthSnapshot;
use kestrel_data::event::BookUpdate;
use kestrel_markets::{Contract, OrderSide, PositionSide, Symbol, Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Public, unauthenticated REST surface (spec.md §6.3 "Public REST").
#[async_trait::async_trait]
pub trait PublicRest: Send + Sync {
    async fn get_contracts(&self) -> Result<HashMap<Symbol, Contract>, ExecutionError>;

    async fn get_historical_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
        start_time: Option<i64>,
    ) -> Result<Vec<Candle>, ExecutionError>;

    async fn get_book(&self) -> Result<HashMap<Symbol, BookUpdate>, ExecutionError>;

    async fn get_depth(&self, symbol: &Symbol, limit: usize) -> Result<DepthSnapshot, ExecutionError>;
}

/// Authenticated, per-strategy-credential REST surface (spec.md §6.3 "User
/// REST"). Each `Strategy` owns its own instance (SPEC_FULL "Per-strategy
/// credential isolation").
#[async_trait::async_trait]
pub trait UserRest: Send + Sync {
    async fn get_account_info(&self) -> Result<Account, ExecutionError>;

    async fn change_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), ExecutionError>;

    async fn is_hedge_mode(&self) -> Result<bool, ExecutionError>;

    async fn change_position_mode(&self, hedge: bool) -> Result<(), ExecutionError>;

    async fn change_margin_type(&self, symbol: &Symbol, margin_type: MarginType) -> Result<(), ExecutionError>;

    #[allow(clippy::too_many_arguments)]
    async fn place_order(
        &self,
        client_order_id: ClientOrderId,
        contract: &Contract,
        order_type: OrderType,
        quantity: Decimal,
        side: OrderSide,
        position_side: PositionSide,
        price: Option<Decimal>,
        time_in_force: Option<TimeInForce>,
    ) -> Result<Order, ExecutionError>;

    async fn cancel_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<(), ExecutionError>;

    async fn get_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<Order, ExecutionError>;

    async fn create_listen_key(&self) -> Result<ListenKey, ExecutionError>;

    async fn update_listen_key(&self, key: &ListenKey) -> Result<(), ExecutionError>;
}

/// Opaque short-lived token enabling the user-stream subscription (spec.md
/// §6.3, glossary "Listen key").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenKey(pub String);

/// spec.md glossary "Stream entity": the three kinds the user stream emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountEvent {
    AccountUpdate {
        balances: Vec<(String, crate::model::AssetBalance)>,
        positions: Vec<crate::model::AccountPosition>,
    },
    AccountConfigUpdate {
        symbol: Symbol,
        leverage: u32,
    },
    OrderTradeUpdate {
        order: Order,
    },
}

/// The user stream's event feed (spec.md §6.3 "User stream"). A real
/// implementation refreshes its listen key every ≤45 min within its 60 min
/// lifetime (see [`crate::listen_key::ListenKeyRefresher`]).
#[async_trait::async_trait]
pub trait UserStream: Send {
    async fn connect(&mut self) -> Result<(), ExecutionError>;

    async fn recv(&mut self) -> Result<AccountEvent, ExecutionError>;
}

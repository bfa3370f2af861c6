//! `MockExecutionClient` (SPEC_FULL supplemented feature 3): synthesizes
//! fills for paper trading / backtesting, emitting the *same*
//! [`AccountEvent`] shape a real client only observes from the venue's user
//! stream, so [`crate::command::CommandHandler::update_order`] never
//! special-cases it (spec.md §9 Open Question, third bullet).
//!
//! Grounded on `services/bot/exchange/fake_exchange_client.py`.

use crate::client::{AccountEvent, ListenKey, PublicRest, UserRest, UserStream};
use crate::error::ExecutionError;
use crate::model::{Account, AssetBalance, ClientOrderId, MarginType, Order, OrderId, OrderStatus, OrderType};
use kestrel_data::candles::Candle;
use kestrel_data::depth::DepthSnapshot;
use kestrel_data::event::{BookUpdate, TradeUpdate};
use kestrel_data::feed::{VenuePublicStream, VenueStreamEvent};
use kestrel_integration::error::SocketError;
use kestrel_markets::{Contract, OrderSide, PositionSide, Symbol, Timeframe};
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockExecutionConfig {
    pub contracts: HashMap<Symbol, Contract>,
    pub starting_balances: HashMap<String, Decimal>,
}

struct Inner {
    contracts: HashMap<Symbol, Contract>,
    account: Account,
    orders: HashMap<OrderId, Order>,
    next_order_seq: u64,
}

/// Synthesizes immediate market-order fills and streams the resulting
/// `OrderTradeUpdate`/`AccountUpdate` events through the same channel a real
/// user stream would deliver them on.
#[derive(Clone)]
pub struct MockExecutionClient {
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<AccountEvent>,
}

/// The [`UserStream`] half of the pair: drains events
/// [`MockExecutionClient`] synthesizes.
pub struct MockUserStream {
    events: mpsc::UnboundedReceiver<AccountEvent>,
}

impl MockExecutionClient {
    pub fn new(config: MockExecutionConfig) -> (Self, MockUserStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let balances = config
            .starting_balances
            .into_iter()
            .map(|(asset, amount)| {
                (
                    asset,
                    AssetBalance {
                        wallet_balance: amount,
                        available_balance: amount,
                    },
                )
            })
            .collect();
        let client = Self {
            inner: Arc::new(Mutex::new(Inner {
                contracts: config.contracts,
                account: Account {
                    balances,
                    positions: Vec::new(),
                },
                orders: HashMap::new(),
                next_order_seq: 0,
            })),
            events: tx,
        };
        (client, MockUserStream { events: rx })
    }
}

#[async_trait::async_trait]
impl PublicRest for MockExecutionClient {
    async fn get_contracts(&self) -> Result<HashMap<Symbol, Contract>, ExecutionError> {
        Ok(self.inner.lock().contracts.clone())
    }

    async fn get_historical_candles(
        &self,
        _symbol: &Symbol,
        _timeframe: Timeframe,
        _limit: usize,
        _start_time: Option<i64>,
    ) -> Result<Vec<Candle>, ExecutionError> {
        Ok(Vec::new())
    }

    async fn get_book(&self) -> Result<HashMap<Symbol, BookUpdate>, ExecutionError> {
        Ok(HashMap::new())
    }

    async fn get_depth(&self, _symbol: &Symbol, _limit: usize) -> Result<DepthSnapshot, ExecutionError> {
        Ok(DepthSnapshot {
            last_update_id: 0,
            bids: Vec::new(),
            asks: Vec::new(),
        })
    }
}

#[async_trait::async_trait]
impl UserRest for MockExecutionClient {
    async fn get_account_info(&self) -> Result<Account, ExecutionError> {
        Ok(self.inner.lock().account.clone())
    }

    async fn change_leverage(&self, _symbol: &Symbol, _leverage: u32) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn is_hedge_mode(&self) -> Result<bool, ExecutionError> {
        Ok(true)
    }

    async fn change_position_mode(&self, _hedge: bool) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn change_margin_type(&self, _symbol: &Symbol, _margin_type: MarginType) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn place_order(
        &self,
        client_order_id: ClientOrderId,
        contract: &Contract,
        _order_type: OrderType,
        quantity: Decimal,
        side: OrderSide,
        position_side: PositionSide,
        price: Option<Decimal>,
        _time_in_force: Option<crate::model::TimeInForce>,
    ) -> Result<Order, ExecutionError> {
        if quantity.is_zero() {
            return Err(ExecutionError::Rejected("invalid quantity".into()));
        }

        let mut inner = self.inner.lock();
        inner.next_order_seq += 1;
        let order = Order {
            id: OrderId(format!("mock-{}", inner.next_order_seq)),
            client_order_id,
            position_id: None,
            symbol: contract.symbol.clone(),
            status: OrderStatus::Filled,
            order_type: OrderType::Market,
            side,
            position_side,
            quantity,
            filled_quantity: quantity,
            // A mock fill at the requested price (or the contract's tick as a
            // floor if unset) — good enough for paper trading / backtesting.
            entry_price: price.unwrap_or(contract.tick_size),
            context: None,
            timestamp: 0,
        };
        inner.orders.insert(order.id.clone(), order.clone());
        drop(inner);

        // Fire the same event shape a real user stream would (SPEC_FULL
        // supplemented feature 3).
        let _ = self.events.send(AccountEvent::OrderTradeUpdate { order: order.clone() });
        Ok(order)
    }

    async fn cancel_order(&self, _symbol: &Symbol, order_id: &OrderId) -> Result<(), ExecutionError> {
        let mut inner = self.inner.lock();
        if let Some(order) = inner.orders.get_mut(order_id) {
            order.status = OrderStatus::Canceled;
        }
        Ok(())
    }

    async fn get_order(&self, _symbol: &Symbol, order_id: &OrderId) -> Result<Order, ExecutionError> {
        self.inner
            .lock()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ExecutionError::BadRequest {
                code: 400,
                message: format!("unknown order {order_id}"),
            })
    }

    async fn create_listen_key(&self) -> Result<ListenKey, ExecutionError> {
        Ok(ListenKey("mock-listen-key".into()))
    }

    async fn update_listen_key(&self, _key: &ListenKey) -> Result<(), ExecutionError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStream for MockUserStream {
    async fn connect(&mut self) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn recv(&mut self) -> Result<AccountEvent, ExecutionError> {
        self.events
            .recv()
            .await
            .ok_or_else(|| ExecutionError::Transport("mock user stream closed".into()))
    }
}

/// A synthetic [`VenuePublicStream`] (spec.md §6.3 "Public stream"): emits a
/// bounded random walk of trade/book ticks per configured symbol at a fixed
/// cadence. The venue's real wire protocol is out of scope (spec.md §1); this
/// is what a local/paper run of the Feed Publisher drives instead of a real
/// exchange WebSocket.
pub struct MockPublicStream {
    starting_price: Decimal,
    symbols: Vec<Symbol>,
    prices: HashMap<Symbol, Decimal>,
    tick_interval: Duration,
    next_symbol: usize,
}

impl MockPublicStream {
    pub fn new(starting_price: Decimal, tick_interval: Duration) -> Self {
        Self {
            starting_price,
            symbols: Vec::new(),
            prices: HashMap::new(),
            tick_interval,
            next_symbol: 0,
        }
    }

    fn step(&mut self, symbol: &Symbol) -> Decimal {
        let starting_price = self.starting_price;
        let price = self.prices.entry(symbol.clone()).or_insert(starting_price);
        let step_bps = rand::rng().random_range(-20..=20);
        let step = *price * Decimal::new(step_bps, 4);
        *price = (*price + step).max(Decimal::new(1, 2));
        *price
    }
}

#[async_trait::async_trait]
impl VenuePublicStream for MockPublicStream {
    async fn connect(&mut self, symbols: &[Symbol]) -> Result<(), SocketError> {
        self.symbols = symbols.to_vec();
        if self.symbols.is_empty() {
            return Err(SocketError::Subscribe("no symbols configured".into()));
        }
        for symbol in &self.symbols {
            self.prices.entry(symbol.clone()).or_insert(self.starting_price);
        }
        self.next_symbol = 0;
        Ok(())
    }

    async fn recv(&mut self, timeout: Duration) -> Result<VenueStreamEvent, SocketError> {
        tokio::time::sleep(self.tick_interval.min(timeout)).await;
        if self.symbols.is_empty() {
            return Err(SocketError::ConnectionClosed("no symbols subscribed".into()));
        }

        let symbol = self.symbols[self.next_symbol % self.symbols.len()].clone();
        self.next_symbol = self.next_symbol.wrapping_add(1);
        let price = self.step(&symbol);
        let now = chrono::Utc::now().timestamp_millis();

        // Alternate trade and book ticks so both entities exercise the pipeline.
        if self.next_symbol % 2 == 0 {
            Ok(VenueStreamEvent::Book {
                symbol,
                exchange_time: now,
                received_time: now,
                data: BookUpdate::new(price, price + Decimal::new(1, 2)),
            })
        } else {
            Ok(VenueStreamEvent::Trade {
                symbol,
                exchange_time: now,
                received_time: now,
                data: TradeUpdate {
                    price,
                    quantity: Decimal::new(rand::rng().random_range(1..=100), 2),
                    timestamp: now,
                    is_buyer_maker: rand::rng().random_bool(0.5),
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_markets::ExchangeId;
    use rust_decimal_macros::dec;

    fn contract() -> Contract {
        Contract {
            exchange: ExchangeId::BinanceTestnet,
            symbol: Symbol::new("btcusdt"),
            base_asset: "BTC".into(),
            quote_asset: "USDT".into(),
            price_decimals: 2,
            quantity_decimals: 3,
            tick_size: dec!(0.01),
            lot_size: dec!(0.001),
            min_notional: dec!(5),
        }
    }

    #[tokio::test]
    async fn place_order_fires_order_trade_update_on_user_stream() {
        let mut contracts = HashMap::new();
        contracts.insert(Symbol::new("btcusdt"), contract());
        let (client, mut stream) = MockExecutionClient::new(MockExecutionConfig {
            contracts,
            starting_balances: HashMap::new(),
        });

        let placed = client
            .place_order(
                ClientOrderId::new(),
                &contract(),
                OrderType::Market,
                dec!(1),
                OrderSide::Buy,
                PositionSide::Long,
                Some(dec!(100)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(placed.status, OrderStatus::Filled);

        match stream.recv().await.unwrap() {
            AccountEvent::OrderTradeUpdate { order } => assert_eq!(order.id, placed.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn public_stream_connect_rejects_empty_symbol_list() {
        let mut stream = MockPublicStream::new(dec!(100), Duration::from_millis(1));
        assert!(stream.connect(&[]).await.is_err());
    }

    #[tokio::test]
    async fn public_stream_emits_events_for_connected_symbols() {
        let symbol = Symbol::new("btcusdt");
        let mut stream = MockPublicStream::new(dec!(100), Duration::from_millis(1));
        stream.connect(&[symbol.clone()]).await.unwrap();

        let first = stream.recv(Duration::from_secs(1)).await.unwrap();
        let second = stream.recv(Duration::from_secs(1)).await.unwrap();
        assert!(matches!(first, VenueStreamEvent::Book { .. } | VenueStreamEvent::Trade { .. }));
        assert!(matches!(second, VenueStreamEvent::Book { .. } | VenueStreamEvent::Trade { .. }));
    }

    #[tokio::test]
    async fn rejects_zero_quantity() {
        let (client, _stream) = MockExecutionClient::new(MockExecutionConfig {
            contracts: HashMap::new(),
            starting_balances: HashMap::new(),
        });
        let result = client
            .place_order(
                ClientOrderId::new(),
                &contract(),
                OrderType::Market,
                Decimal::ZERO,
                OrderSide::Buy,
                PositionSide::Long,
                None,
                None,
            )
            .await;
        assert!(result.is_err());
    }
}

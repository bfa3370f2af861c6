//! Strategy Orchestrator process (spec.md §2, §4.7-§4.8): drives
//! [`ExchangeState`] off the live bus (or, in replay mode, off
//! [`crate::system::replay`]) and dispatches book/trade ticks to every
//! [`Strategy`] tracking the affected symbol.
//!
//! Grounded on `services/strategy_orchestrator/orchestrator.py`'s dispatch
//! loop: `ExchangeState` is preloaded once at startup, then every bus
//! message either feeds derived state or drives a strategy callback.
//! spec.md §5's ordering rule ("a book update drives
//! `CommandHandler.execute` when the symbol has outgoing commands; only when
//! the queue is empty do stop-loss/take-profit checks run") is already
//! implemented inside [`Strategy::on_book`]; this module's job is routing,
//! not re-deciding that rule.

use crate::exchange_state::ExchangeState;
use kestrel_data::bus::BusConsumer;
use kestrel_data::event::{BookUpdate, DepthUpdate, TradeUpdate};
use kestrel_execution::client::AccountEvent;
use kestrel_markets::Symbol;
use kestrel_trader::Strategy;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// spec.md §5 "Feed-lag check": warn threshold.
pub const LAG_WARN_MS: i64 = 2_000;
/// spec.md §5 "Feed-lag check": triggers orderly strategy shutdown.
pub const LAG_SHUTDOWN_MS: i64 = 10_000;

/// Drives [`ExchangeState`] off bus updates and fans book/trade ticks out to
/// every [`Strategy`] whose rules track the affected symbol (spec.md §2
/// "Strategy Orchestrator" / "Strategy").
pub struct Orchestrator {
    pub state: ExchangeState,
    pub strategies: Vec<Strategy>,
    shutdown_requested: bool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("strategies", &self.strategies.len())
            .field("shutdown_requested", &self.shutdown_requested)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(state: ExchangeState, strategies: Vec<Strategy>) -> Self {
        Self {
            state,
            strategies,
            shutdown_requested: false,
        }
    }

    /// `true` once feed lag has crossed [`LAG_SHUTDOWN_MS`] (spec.md §5
    /// "the strategy initiates orderly shutdown (durable state preserved)").
    /// The caller's run loop checks this after every dispatched message and
    /// stops feeding new work in without killing the process.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    fn check_lag(&mut self, symbol: &Symbol, event_timestamp: i64) {
        let now = chrono::Utc::now().timestamp_millis();
        let lag = now - event_timestamp;
        if lag >= LAG_SHUTDOWN_MS {
            error!(%symbol, lag_ms = lag, "feed lag critical, initiating orderly shutdown");
            self.shutdown_requested = true;
        } else if lag >= LAG_WARN_MS {
            warn!(%symbol, lag_ms = lag, "feed lag warning");
        }
    }

    async fn on_trade(&mut self, symbol: &Symbol, trade: TradeUpdate) {
        self.check_lag(symbol, trade.timestamp);
        if !self.state.apply_trade(symbol, &trade) {
            return;
        }
        // spec.md §4.3: only a non-NONE tick re-runs signal evaluation.
        for strategy in self.strategies.iter_mut().filter(|s| s.rules.symbols.contains(symbol)) {
            strategy.evaluate_signals(symbol, &self.state);
        }
    }

    async fn on_book(&mut self, symbol: &Symbol, book: BookUpdate) {
        self.state.apply_book(symbol, book);
        for strategy in self.strategies.iter_mut().filter(|s| s.rules.symbols.contains(symbol)) {
            strategy.on_book(symbol, &self.state, book).await;
        }
    }

    async fn on_depth(&mut self, symbol: &Symbol, depth: DepthUpdate) {
        self.check_lag(symbol, depth.timestamp);
        self.state.apply_depth(symbol, depth);
    }

    /// Runs until the bus closes or feed lag forces an orderly shutdown.
    /// Used by the live path; [`crate::system::replay`] drives the same
    /// hooks directly instead of through a [`kestrel_data::bus::BoundQueue`].
    pub async fn run(mut self, mut queue: kestrel_data::bus::BoundQueue) -> Self {
        while queue.dispatch_next(&mut self).await {
            if self.shutdown_requested {
                break;
            }
        }
        self
    }

    /// Live-mode variant of [`Orchestrator::run`] that also drains
    /// account-stream events (spec.md §2 "consumes user-stream events ...
    /// for reconciliation"). Each `(strategy index, event)` pair is produced
    /// by a task elsewhere that owns only the matching [`Strategy`]'s
    /// `UserStream` half, never the `Strategy` itself, so there is no
    /// aliasing: this loop remains the single mutator of `self.strategies`
    /// (spec.md §5 "one cooperative event loop per process").
    pub async fn run_with_account_events(
        mut self,
        mut queue: kestrel_data::bus::BoundQueue,
        mut account_rx: mpsc::UnboundedReceiver<(usize, AccountEvent)>,
    ) -> Self {
        loop {
            tokio::select! {
                more = queue.dispatch_next(&mut self) => {
                    if !more || self.shutdown_requested {
                        break;
                    }
                }
                received = account_rx.recv() => {
                    match received {
                        Some((index, event)) => {
                            if let Some(strategy) = self.strategies.get_mut(index) {
                                if let Err(err) = strategy.on_account_event(event).await {
                                    warn!(strategy_index = index, error = %err, "account event handling failed");
                                }
                            }
                        }
                        None => {
                            // Every strategy's account-event task has exited; keep
                            // serving market data off the bus alone.
                            while queue.dispatch_next(&mut self).await {
                                if self.shutdown_requested {
                                    break;
                                }
                            }
                            break;
                        }
                    }
                }
            }
        }
        self
    }
}

#[async_trait::async_trait]
impl BusConsumer for Orchestrator {
    async fn reset(&mut self) {
        self.state.reset();
    }

    async fn update(&mut self, entity: &str, symbol: &Symbol, data: serde_json::Value) {
        match entity {
            "trade" => match serde_json::from_value::<TradeUpdate>(data) {
                Ok(trade) => self.on_trade(symbol, trade).await,
                Err(err) => warn!(%symbol, error = %err, "malformed trade update"),
            },
            "book" => match serde_json::from_value::<BookUpdate>(data) {
                Ok(book) => self.on_book(symbol, book).await,
                Err(err) => warn!(%symbol, error = %err, "malformed book update"),
            },
            "depth" => match serde_json::from_value::<DepthUpdate>(data) {
                Ok(depth) => self.on_depth(symbol, depth).await,
                Err(err) => warn!(%symbol, error = %err, "malformed depth update"),
            },
            other => warn!(%symbol, entity = other, "unrecognised market data entity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_data::books::BookCache;
    use kestrel_data::bus::{BusMessage, TopicBus};
    use kestrel_execution::client::UserRest;
    use kestrel_execution::error::ExecutionError;
    use kestrel_execution::model::account::Account;
    use kestrel_execution::model::{ClientOrderId, MarginType, Order, OrderId, OrderType, TimeInForce};
    use kestrel_markets::{Contract, ExchangeId, OrderSide, PositionSide};
    use kestrel_store::memory::InMemoryStore;
    use kestrel_store::Store;
    use kestrel_trader::config::{Credentials, StrategyRules};
    use kestrel_trader::market_view::MarketView;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct StubUserRest;

    #[async_trait::async_trait]
    impl UserRest for StubUserRest {
        async fn get_account_info(&self) -> Result<Account, ExecutionError> {
            Ok(Account::default())
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
            _client_order_id: ClientOrderId,
            _contract: &Contract,
            _order_type: OrderType,
            _quantity: Decimal,
            _side: OrderSide,
            _position_side: PositionSide,
            _price: Option<Decimal>,
            _time_in_force: Option<TimeInForce>,
        ) -> Result<Order, ExecutionError> {
            unimplemented!("not exercised in these tests")
        }
        async fn cancel_order(&self, _symbol: &Symbol, _order_id: &OrderId) -> Result<(), ExecutionError> {
            Ok(())
        }
        async fn get_order(&self, _symbol: &Symbol, _order_id: &OrderId) -> Result<Order, ExecutionError> {
            unimplemented!("not exercised in these tests")
        }
        async fn create_listen_key(&self) -> Result<kestrel_execution::client::ListenKey, ExecutionError> {
            unimplemented!("not exercised in these tests")
        }
        async fn update_listen_key(&self, _key: &kestrel_execution::client::ListenKey) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn contract(symbol: Symbol) -> Contract {
        Contract {
            exchange: ExchangeId::BinanceTestnet,
            symbol,
            base_asset: "BTC".into(),
            quote_asset: "USDT".into(),
            price_decimals: 2,
            quantity_decimals: 3,
            tick_size: dec!(0.01),
            lot_size: dec!(0.001),
            min_notional: dec!(5),
        }
    }

    fn orchestrator(symbol: Symbol) -> Orchestrator {
        let mut contracts = HashMap::new();
        contracts.insert(symbol.clone(), contract(symbol.clone()));
        let state = ExchangeState::new(contracts, vec![kestrel_markets::Timeframe::M1], 100, 100, Arc::new(BookCache::new()));

        let order_store: Arc<dyn Store<Order>> = Arc::new(InMemoryStore::new());
        let position_store: Arc<dyn Store<kestrel_execution::model::Position>> = Arc::new(InMemoryStore::new());
        let rules = StrategyRules {
            id: "s1".into(),
            name: "test".into(),
            credentials: Credentials { api_key: "k".into(), api_secret: "s".into() },
            symbols: vec![symbol],
            leverage: 5,
            balance_stake: dec!(0.1),
            trailing: false,
            trailing_callback_rate: None,
            stop_loss: Some(kestrel_trader::config::StopLossRule { rate: dec!(0.02) }),
            take_profit: None,
            conditions: Vec::new(),
            conditions_trigger_count: 1,
        };
        let strategy = Strategy::new(rules, Arc::new(StubUserRest), order_store, position_store);
        Orchestrator::new(state, vec![strategy])
    }

    #[tokio::test]
    async fn book_update_reaches_tracked_strategy_without_panicking() {
        let symbol = Symbol::new("btcusdt");
        let mut orch = orchestrator(symbol.clone());

        orch.update("book", &symbol, serde_json::to_value(BookUpdate::new(dec!(19500), dec!(19501))).unwrap()).await;
        assert_eq!(orch.state.book(&symbol), Some(BookUpdate::new(dec!(19500), dec!(19501))));
    }

    #[tokio::test]
    async fn untracked_symbol_is_ignored() {
        let symbol = Symbol::new("btcusdt");
        let mut orch = orchestrator(symbol.clone());
        let other = Symbol::new("ethusdt");

        orch.update("book", &other, serde_json::to_value(BookUpdate::new(dec!(10), dec!(11))).unwrap()).await;
        assert!(orch.state.contract(&other).is_none());
    }

    #[tokio::test]
    async fn critical_lag_on_trade_requests_shutdown() {
        let symbol = Symbol::new("btcusdt");
        let mut orch = orchestrator(symbol.clone());

        let ancient = chrono::Utc::now().timestamp_millis() - (LAG_SHUTDOWN_MS + 1_000);
        let trade = TradeUpdate { price: dec!(100), quantity: dec!(1), timestamp: ancient, is_buyer_maker: false };
        orch.update("trade", &symbol, serde_json::to_value(trade).unwrap()).await;

        assert!(orch.shutdown_requested());
    }

    #[tokio::test]
    async fn reset_clears_depth_but_keeps_contract() {
        let symbol = Symbol::new("btcusdt");
        let mut orch = orchestrator(symbol.clone());
        orch.reset().await;
        assert!(orch.state.contract(&symbol).is_some());
    }

    #[tokio::test]
    async fn run_with_account_events_drains_both_sources_and_stops() {
        let symbol = Symbol::new("btcusdt");
        let orch = orchestrator(symbol.clone());
        let bus = TopicBus::new(16);
        let queue = bus.subscribe(vec!["#".into()]);
        let (account_tx, account_rx) = tokio::sync::mpsc::unbounded_channel();

        account_tx.send((0, AccountEvent::AccountConfigUpdate { symbol: symbol.clone(), leverage: 10 })).unwrap();
        drop(account_tx);
        drop(bus);

        let orch = orch.run_with_account_events(queue, account_rx).await;
        assert!(!orch.shutdown_requested());
    }

    #[tokio::test]
    async fn run_stops_when_bus_closes() {
        let symbol = Symbol::new("btcusdt");
        let orch = orchestrator(symbol.clone());
        let bus = TopicBus::new(16);
        let queue = bus.subscribe(vec!["#".into()]);
        bus.publish(BusMessage::update(&symbol, "book", serde_json::to_value(BookUpdate::new(dec!(10), dec!(11))).unwrap()));
        drop(bus);

        let orch = orch.run(queue).await;
        assert!(!orch.shutdown_requested());
    }
}

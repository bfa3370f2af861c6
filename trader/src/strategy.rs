//! [`Strategy`]: the callback-driven runtime spec.md §4.7 describes, wiring
//! [`crate::config::StrategyRules`], [`crate::signal::check_signal`],
//! [`crate::exits`], [`crate::quantity::calc_trade_quantity`] and
//! [`crate::reconcile::reconcile`] into the commands a
//! [`kestrel_execution::command::CommandHandler`] executes.
//!
//! Grounded on `services/bot/strategies/base/strategy.py`, whose constructor
//! is why each `Strategy` owns its own `user_rest`/`user_stream`/
//! `CommandHandler` triple rather than sharing one (SPEC_FULL "Per-strategy
//! credential isolation").

use crate::config::StrategyRules;
use crate::error::TraderError;
use crate::market_view::MarketView;
use crate::{exits, quantity, reconcile, signal};
use kestrel_data::event::BookUpdate;
use kestrel_execution::client::{AccountEvent, UserRest, UserStream};
use kestrel_execution::command::{Command, CommandHandler, Notify, PlaceOrder, TrailingStop};
use kestrel_execution::model::account::Account;
use kestrel_execution::model::PositionStatus;
use kestrel_execution::storage::LocalStorage;
use kestrel_markets::{OrderSide, PositionSide, Symbol};
use kestrel_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A full close for a position that stop-loss or the last take-profit rung
/// triggered.
fn exit_command(position_side: PositionSide, symbol: &Symbol, market: &dyn MarketView, quantity: rust_decimal::Decimal, trailing_rate: Option<rust_decimal::Decimal>) -> Option<Command> {
    let contract = market.contract(symbol)?.clone();
    let order_side = position_side.exit_order_side();
    let place = Command::PlaceOrder(PlaceOrder {
        contract: contract.clone(),
        position_side,
        order_side,
        quantity,
        context: None,
    });
    Some(match trailing_rate {
        Some(rate) => {
            let book = market.book(symbol)?;
            Command::TrailingStop(TrailingStop::new(contract, book, order_side, rate, place))
        }
        None => place,
    })
}

/// Holds a [`StrategyRules`] configuration and the runtime state spec.md
/// §4.7 describes: account cache, local Position/Order storage, and the
/// per-strategy [`CommandHandler`].
pub struct Strategy {
    pub rules: StrategyRules,
    user_rest: Arc<dyn UserRest>,
    command_handler: CommandHandler,
    storage: LocalStorage,
    account: Account,
    ready: bool,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("id", &self.rules.id)
            .field("ready", &self.ready)
            .finish()
    }
}

impl Strategy {
    pub fn new(
        rules: StrategyRules,
        user_rest: Arc<dyn UserRest>,
        order_store: Arc<dyn Store<kestrel_execution::model::Order>>,
        position_store: Arc<dyn Store<kestrel_execution::model::Position>>,
    ) -> Self {
        let storage = LocalStorage::new(rules.id.clone(), rules.symbols.clone(), order_store, position_store);
        let command_handler = CommandHandler::new(user_rest.clone());
        Self {
            rules,
            user_rest,
            command_handler,
            storage,
            account: Account::default(),
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// spec.md §4.7 "Startup sequence (strict)", steps 1-6.
    pub async fn startup(
        &mut self,
        user_stream: &mut (dyn UserStream + Send),
        position_store: &Arc<dyn Store<kestrel_execution::model::Position>>,
        order_store: &Arc<dyn Store<kestrel_execution::model::Order>>,
        price_decimals_by_symbol: &HashMap<Symbol, u32>,
    ) -> Result<(), TraderError> {
        // 1. Connect user stream and wait until ready.
        user_stream.connect().await?;

        // 2. Fetch account; populate balances.
        self.account = self.user_rest.get_account_info().await?;

        // 3. Reconcile positions (spec.md §4.8).
        let outcomes = reconcile::reconcile(&self.rules.id, &self.rules.symbols, price_decimals_by_symbol, &self.account, position_store)
            .await
            .map_err(TraderError::Store)?;
        let mut positions = Vec::new();
        let mut orders = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                reconcile::ReconciliationOutcome::Matched(position) => {
                    let position_orders = reconcile::orders_for_position(&position, order_store).await.map_err(TraderError::Store)?;
                    orders.extend(position_orders);
                    positions.push(position);
                }
                reconcile::ReconciliationOutcome::NoOpenPosition => {}
                reconcile::ReconciliationOutcome::Mismatched => self.storage.mark_busy(symbol),
            }
        }
        self.storage.seed(positions, orders);

        // 4. Ensure hedge mode is on.
        let hedge = self.user_rest.is_hedge_mode().await?;
        if !hedge {
            self.user_rest
                .change_position_mode(true)
                .await
                .map_err(|e| TraderError::StartupFailed(e.to_string()))?;
        }

        // 5. For each configured symbol, set leverage.
        for symbol in &self.rules.symbols {
            self.user_rest
                .change_leverage(symbol, self.rules.leverage)
                .await
                .map_err(|e| TraderError::StartupFailed(e.to_string()))?;
        }

        // 6. Mark ready.
        self.ready = true;
        info!(strategy_id = %self.rules.id, "strategy startup complete");
        Ok(())
    }

    /// Applies one user-stream event (spec.md §2 "consumes user-stream
    /// events ... for reconciliation"). `OrderTradeUpdate` runs through the
    /// same idempotent path `CommandHandler::handle_place_order`'s own poll
    /// loop uses (spec.md §4.6), which is what makes at-most-once placement
    /// hold under duplicate delivery.
    pub async fn on_account_event(&mut self, event: AccountEvent) -> Result<(), TraderError> {
        match event {
            AccountEvent::AccountUpdate { balances, positions } => {
                self.account.apply_update(balances, positions);
            }
            AccountEvent::AccountConfigUpdate { symbol, leverage } => {
                info!(%symbol, leverage, "account leverage config update");
            }
            AccountEvent::OrderTradeUpdate { order } => {
                self.command_handler.update_order(order, &mut self.storage).await?;
            }
        }
        Ok(())
    }

    /// spec.md §4.7 `check_signal`: evaluated on candle ticks. Triggered
    /// `(position_side, order_side)` groups with no outstanding order for
    /// their symbol become a new `PlaceOrder` (spec.md §4.7 "enqueue a
    /// PlaceOrder"), sized by `calc_trade_quantity` and optionally wrapped in
    /// a `TrailingStop`.
    ///
    /// "No outstanding order exists on that (symbol, position, side)" is
    /// approximated at symbol granularity via `CommandHandler::has_pending`:
    /// the queue `CommandHandler` actually exposes is per-symbol (spec.md
    /// §4.6 "per-symbol ordered set of commands"), not per-side, so a
    /// symbol with any pending command skips new entries until its queue
    /// drains.
    pub fn evaluate_signals(&mut self, symbol: &Symbol, market: &dyn MarketView) {
        if self.storage.is_busy(symbol) || self.command_handler.has_pending(symbol) {
            return;
        }

        let groups = signal::check_signal(&self.rules, market, symbol);
        for group in groups {
            self.enqueue_entry(symbol, market, group.position_side, group.order_side);
        }
    }

    fn enqueue_entry(&mut self, symbol: &Symbol, market: &dyn MarketView, position_side: PositionSide, order_side: OrderSide) {
        let (Some(contract), Some(book)) = (market.contract(symbol), market.book(symbol)) else {
            return;
        };

        let quantity = match quantity::calc_trade_quantity(contract, &self.account, &book, order_side, self.rules.balance_stake, self.rules.leverage) {
            Ok(q) => q,
            Err(err) => {
                warn!(%symbol, error = %err, "entry quantity rejected by risk check");
                return;
            }
        };

        let place = PlaceOrder {
            contract: contract.clone(),
            position_side,
            order_side,
            quantity,
            context: None,
        };

        let command = match self.rules.trailing_callback_rate {
            Some(rate) if self.rules.trailing => Command::TrailingStop(TrailingStop::new(contract.clone(), book, order_side, rate, Command::PlaceOrder(place))),
            _ => Command::PlaceOrder(place),
        };

        self.command_handler.append(symbol.clone(), command);
    }

    /// One book tick for `symbol` (spec.md §5 ordering rule): if the symbol
    /// has outgoing commands, this book update drives
    /// `CommandHandler::execute` (so trailing stops react); only when the
    /// queue is empty do stop-loss/take-profit checks run against it.
    pub async fn on_book(&mut self, symbol: &Symbol, market: &dyn MarketView, book: BookUpdate) {
        if book.is_abnormal() {
            return;
        }

        if self.command_handler.has_pending(symbol) {
            self.command_handler.execute(symbol, book, &mut self.storage).await;
            return;
        }

        self.check_exits(symbol, market, book);
    }

    fn check_exits(&mut self, symbol: &Symbol, market: &dyn MarketView, book: BookUpdate) {
        for side in [PositionSide::Long, PositionSide::Short] {
            let Some(position) = self.storage.get_position(symbol, side) else {
                continue;
            };
            if position.status != PositionStatus::Open {
                continue;
            }

            if let Some(rule) = &self.rules.stop_loss {
                if exits::stop_loss_triggered(position, rule, book.bid, book.ask) {
                    info!(%symbol, side = %side, "stop-loss triggered, closing position");
                    if let Some(command) = exit_command(side, symbol, market, position.quantity, self.trailing_rate()) {
                        self.command_handler.append(symbol.clone(), command);
                    }
                    continue;
                }
            }

            if let Some(rule) = &self.rules.take_profit {
                let Some(contract) = market.contract(symbol) else { continue };
                if let Some(exit_qty) = exits::take_profit_step(position, rule, book.bid, book.ask, contract.min_notional, contract.lot_size) {
                    info!(%symbol, side = %side, quantity = %exit_qty, "take-profit step triggered");
                    if let Some(command) = exit_command(side, symbol, market, exit_qty, self.trailing_rate()) {
                        self.command_handler.append(symbol.clone(), command);
                    }
                }
            }
        }
    }

    fn trailing_rate(&self) -> Option<rust_decimal::Decimal> {
        if self.rules.trailing {
            self.rules.trailing_callback_rate
        } else {
            None
        }
    }

    /// `Notify` command helper, used by callers that want to surface a
    /// side-effect-only message through the same pipeline (spec.md §4.6
    /// `Notify`).
    pub fn notify(&mut self, symbol: &Symbol, position_id: String, order_id: Option<String>, message: String) {
        self.command_handler.append(
            symbol.clone(),
            Command::Notify(Notify {
                position_id,
                order_id,
                message,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use kestrel_data::candles::indicators::IndicatorView;
    use kestrel_data::candles::CandlesAggregator;
    use kestrel_execution::error::ExecutionError;
    use kestrel_execution::model::{ClientOrderId, MarginType, Order, OrderId, OrderType, TimeInForce};
    use kestrel_markets::{Contract, ExchangeId, Timeframe};
    use kestrel_store::memory::InMemoryStore;
    use rust_decimal::Decimal;
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

    fn rules(symbol: Symbol) -> StrategyRules {
        StrategyRules {
            id: "s1".into(),
            name: "test".into(),
            credentials: Credentials { api_key: "k".into(), api_secret: "s".into() },
            symbols: vec![symbol],
            leverage: 5,
            balance_stake: dec!(0.1),
            trailing: false,
            trailing_callback_rate: None,
            stop_loss: Some(crate::config::StopLossRule { rate: dec!(0.02) }),
            take_profit: None,
            conditions: Vec::new(),
            conditions_trigger_count: 1,
        }
    }

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

    struct FakeMarket {
        contract: Contract,
        book: BookUpdate,
    }

    impl MarketView for FakeMarket {
        fn contract(&self, _symbol: &Symbol) -> Option<&Contract> {
            Some(&self.contract)
        }
        fn book(&self, _symbol: &Symbol) -> Option<BookUpdate> {
            Some(self.book)
        }
        fn candles(&self, _symbol: &Symbol, _timeframe: Timeframe) -> Option<&CandlesAggregator> {
            None
        }
        fn indicator_view(&self, _symbol: &Symbol, _timeframe: Timeframe) -> Option<&IndicatorView> {
            None
        }
    }

    fn strategy(symbol: Symbol) -> Strategy {
        let order_store: Arc<dyn Store<Order>> = Arc::new(InMemoryStore::new());
        let position_store: Arc<dyn Store<kestrel_execution::model::Position>> = Arc::new(InMemoryStore::new());
        Strategy::new(rules(symbol), Arc::new(StubUserRest), order_store, position_store)
    }

    #[test]
    fn busy_symbols_skip_signal_evaluation() {
        let symbol = Symbol::new("btcusdt");
        let mut strat = strategy(symbol.clone());
        strat.storage.mark_busy(symbol.clone());

        let market = FakeMarket { contract: contract(), book: BookUpdate::new(dec!(100), dec!(100.1)) };
        // No conditions configured, so this would be a no-op regardless; the
        // real assertion is that `is_busy` short-circuits before any panic
        // from an empty `conditions` list reaching a contract lookup.
        strat.evaluate_signals(&symbol, &market);
        assert!(!strat.command_handler.has_pending(&symbol));
    }

    #[tokio::test]
    async fn stop_loss_enqueues_full_close() {
        let symbol = Symbol::new("btcusdt");
        let mut strat = strategy(symbol.clone());

        let mut position = kestrel_execution::model::Position::new(symbol.clone(), PositionSide::Long, "s1".into(), 0);
        position.quantity = dec!(1);
        position.total_quantity = dec!(1);
        position.entry_price = dec!(20000);
        strat.storage.seed(vec![position], vec![]);

        let market = FakeMarket { contract: contract(), book: BookUpdate::new(dec!(19500), dec!(19501)) };
        strat.on_book(&symbol, &market, BookUpdate::new(dec!(19500), dec!(19501))).await;

        assert!(strat.command_handler.has_pending(&symbol));
    }

    #[tokio::test]
    async fn abnormal_book_prices_are_ignored_on_exit_check() {
        let symbol = Symbol::new("btcusdt");
        let mut strat = strategy(symbol.clone());
        let market = FakeMarket { contract: contract(), book: BookUpdate::new(dec!(100), dec!(101)) };

        strat.on_book(&symbol, &market, BookUpdate::new(dec!(-1), dec!(100))).await;
        assert!(!strat.command_handler.has_pending(&symbol));
    }
}

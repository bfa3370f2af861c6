//! [`ExchangeState`]: the single owner of per-symbol `Contract`/`Book`/
//! `Candles`/`Depth` (spec.md §3 "Ownership": "`ExchangeState` exclusively
//! owns `Contract`, `Book`, `Candles`, `Depth`; a `Strategy` only ever reads
//! them"). This is also the concrete implementation of
//! [`kestrel_trader::market_view::MarketView`] every `Strategy` reads
//! through — the trait lives in `kestrel-trader` precisely so that crate
//! never depends on this one (spec.md §3, dependency direction is reversed).
//!
//! Grounded on `services/bot/exchange_state.py`: one `Depth`/`BookCache`
//! entry per symbol, one `CandlesAggregator` + [`IndicatorView`] pair per
//! `(symbol, timeframe)`.

use kestrel_data::books::BookCache;
use kestrel_data::bus::BusConsumer;
use kestrel_data::candles::indicators::IndicatorView;
use kestrel_data::candles::{CandlesAggregator, TickType};
use kestrel_data::depth::Depth;
use kestrel_data::event::{BookUpdate, DataKind, MarketEvent};
use kestrel_markets::{Contract, Symbol, Timeframe};
use kestrel_trader::market_view::MarketView;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// One `(CandlesAggregator, IndicatorView)` pair per tracked timeframe. The
/// view is invalidated whenever its ring changes (spec.md §4.3 "On any
/// non-NONE transition invalidate the cached indicator frame").
struct CandleSeries {
    aggregator: CandlesAggregator,
    view: IndicatorView,
}

impl CandleSeries {
    fn new(timeframe: Timeframe, limit: usize) -> Self {
        Self {
            aggregator: CandlesAggregator::new(timeframe, limit),
            view: IndicatorView::new(),
        }
    }

    fn on_trade(&mut self, price: rust_decimal::Decimal, quantity: rust_decimal::Decimal, timestamp: i64) -> bool {
        if matches!(self.aggregator.update(price, quantity, timestamp), TickType::None) {
            false
        } else {
            self.view.invalidate();
            true
        }
    }
}

/// Per-symbol derived market state: its `Contract`, a `Depth` book of
/// configurable limit, a candle series per tracked `Timeframe`.
struct SymbolState {
    contract: Contract,
    depth: Depth,
    candles: HashMap<Timeframe, CandleSeries>,
}

/// Shared, process-wide market state an orchestrator builds once at startup
/// and every `Strategy` reads through [`MarketView`] (spec.md §3, §4.1-§4.5).
///
/// spec.md §5 runs one cooperative event loop per process, so nothing here
/// needs interior mutability for the main loop itself; [`BookCache`] stays
/// `RwLock`-backed only because it's also read by the alive/feed-lag
/// watchdog tasks spawned alongside the main loop.
pub struct ExchangeState {
    symbols: HashMap<Symbol, SymbolState>,
    books: Arc<BookCache>,
    candles_limit: usize,
    depth_limit: usize,
    timeframes: Vec<Timeframe>,
}

impl std::fmt::Debug for ExchangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeState")
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}

impl ExchangeState {
    pub fn new(
        contracts: HashMap<Symbol, Contract>,
        timeframes: Vec<Timeframe>,
        candles_limit: usize,
        depth_limit: usize,
        books: Arc<BookCache>,
    ) -> Self {
        let symbols = contracts
            .into_iter()
            .map(|(symbol, contract)| {
                let candles = timeframes
                    .iter()
                    .map(|&tf| (tf, CandleSeries::new(tf, candles_limit)))
                    .collect();
                (
                    symbol,
                    SymbolState {
                        contract,
                        depth: Depth::new(depth_limit),
                        candles,
                    },
                )
            })
            .collect();

        Self {
            symbols,
            books,
            candles_limit,
            depth_limit,
            timeframes,
        }
    }

    /// Seeds historical candles for `symbol`/`timeframe`, synthesizing gap
    /// bars (spec.md §4.3 `set_snapshot`).
    pub fn seed_candles(&mut self, symbol: &Symbol, timeframe: Timeframe, history: Vec<kestrel_data::candles::Candle>) {
        if let Some(state) = self.symbols.get_mut(symbol) {
            if let Some(series) = state.candles.get_mut(&timeframe) {
                series.aggregator.set_snapshot(history);
                series.view.invalidate();
            }
        }
    }

    /// Seeds the initial depth snapshot for `symbol` (spec.md §4.5
    /// `set_snapshot`).
    pub fn seed_depth(&mut self, symbol: &Symbol, snapshot: kestrel_data::depth::DepthSnapshot) {
        if let Some(state) = self.symbols.get_mut(symbol) {
            state.depth.set_snapshot(snapshot);
        }
    }

    /// Drops every derived symbol state back to its contract-only shape
    /// (spec.md §4.1 "reset: drop all derived state, re-snapshot").
    pub fn reset(&mut self) {
        self.books.clear();
        for state in self.symbols.values_mut() {
            state.depth = Depth::new(self.depth_limit);
            for &tf in &self.timeframes {
                state.candles.insert(tf, CandleSeries::new(tf, self.candles_limit));
            }
        }
    }

    pub fn depth(&self, symbol: &Symbol) -> Option<&Depth> {
        self.symbols.get(symbol).map(|s| &s.depth)
    }

    /// Feeds a trade into every tracked timeframe for `symbol`. Returns
    /// `true` if any timeframe actually ticked (spec.md §4.3 `TickType` is
    /// not `None`), which is the orchestrator's cue to re-run signal
    /// evaluation (spec.md §4.7) rather than recomputing against an
    /// unchanged candle ring.
    pub fn apply_trade(&mut self, symbol: &Symbol, trade: &kestrel_data::event::TradeUpdate) -> bool {
        let Some(state) = self.symbols.get_mut(symbol) else {
            return false;
        };
        let mut ticked = false;
        for series in state.candles.values_mut() {
            if series.on_trade(trade.price, trade.quantity, trade.timestamp) {
                ticked = true;
            }
        }
        ticked
    }

    /// Caches the latest book for `symbol` (spec.md §4.4).
    pub fn apply_book(&mut self, symbol: &Symbol, book: BookUpdate) {
        if self.symbols.contains_key(symbol) {
            self.books.set(symbol.clone(), book);
        }
    }

    /// Feeds a depth diff into `symbol`'s order book (spec.md §4.5).
    pub fn apply_depth(&mut self, symbol: &Symbol, depth: kestrel_data::event::DepthUpdate) {
        if let Some(state) = self.symbols.get_mut(symbol) {
            state.depth.update(depth);
        }
    }
}

impl MarketView for ExchangeState {
    fn contract(&self, symbol: &Symbol) -> Option<&Contract> {
        self.symbols.get(symbol).map(|s| &s.contract)
    }

    fn book(&self, symbol: &Symbol) -> Option<BookUpdate> {
        self.books.get(symbol)
    }

    fn candles(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&CandlesAggregator> {
        self.symbols
            .get(symbol)
            .and_then(|s| s.candles.get(&timeframe))
            .map(|series| &series.aggregator)
    }

    fn indicator_view(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&IndicatorView> {
        self.symbols
            .get(symbol)
            .and_then(|s| s.candles.get(&timeframe))
            .map(|series| &series.view)
    }
}

/// Bus-side consumer that keeps an [`ExchangeState`] current (spec.md §4.2):
/// `reset` drops derived state, `update` feeds trades/book/depth into the
/// matching per-symbol structures. Book updates are cached separately in
/// the shared [`BookCache`] so [`MarketView::book`] stays lock-cheap.
pub struct ExchangeStateConsumer {
    pub state: ExchangeState,
}

#[async_trait::async_trait]
impl BusConsumer for ExchangeStateConsumer {
    async fn reset(&mut self) {
        self.state.reset();
    }

    async fn update(&mut self, entity: &str, symbol: &Symbol, data: serde_json::Value) {
        match entity {
            "trade" => match serde_json::from_value::<kestrel_data::event::TradeUpdate>(data) {
                Ok(trade) => {
                    self.state.apply_trade(symbol, &trade);
                }
                Err(err) => warn!(%symbol, error = %err, "malformed trade update"),
            },
            "book" => match serde_json::from_value::<BookUpdate>(data) {
                Ok(book) => self.state.apply_book(symbol, book),
                Err(err) => warn!(%symbol, error = %err, "malformed book update"),
            },
            "depth" => match serde_json::from_value::<kestrel_data::event::DepthUpdate>(data) {
                Ok(depth) => self.state.apply_depth(symbol, depth),
                Err(err) => warn!(%symbol, error = %err, "malformed depth update"),
            },
            other => warn!(%symbol, entity = other, "unrecognised market data entity"),
        }
    }
}

/// Converts one bus-delivered update into the [`MarketEvent`] envelope the
/// replay path persists (spec.md §3 `UpdateLog`), tagged by [`DataKind`].
pub fn market_event_from_update(
    symbol: Symbol,
    entity: &str,
    data: serde_json::Value,
    exchange_time: i64,
    received_time: i64,
) -> Option<MarketEvent<DataKind>> {
    let kind = match entity {
        "trade" => DataKind::Trade(serde_json::from_value(data).ok()?),
        "book" => DataKind::Book(serde_json::from_value(data).ok()?),
        "depth" => DataKind::Depth(serde_json::from_value(data).ok()?),
        _ => return None,
    };
    Some(MarketEvent {
        symbol,
        exchange_time,
        received_time,
        data: kind,
    })
}

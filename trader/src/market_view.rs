//! The narrow read-only view into shared market state a [`crate::strategy::Strategy`]
//! needs (spec.md §3 "Ownership": `ExchangeState` exclusively owns
//! `Contract`/`Book`/`Candles`/`Depth`; a `Strategy` only ever reads them).
//!
//! [`kestrel_core`](../../core)'s `ExchangeState` is the concrete
//! implementation; this crate only depends on the trait so `kestrel-trader`
//! never depends on `kestrel-core` (dependency direction is the reverse).

use kestrel_data::candles::indicators::IndicatorView;
use kestrel_data::candles::CandlesAggregator;
use kestrel_data::event::BookUpdate;
use kestrel_markets::{Contract, Symbol, Timeframe};

pub trait MarketView {
    fn contract(&self, symbol: &Symbol) -> Option<&Contract>;

    fn book(&self, symbol: &Symbol) -> Option<BookUpdate>;

    fn candles(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&CandlesAggregator>;

    /// The lazy indicator projection paired with that same candle ring
    /// (spec.md §4.4). Implementors keep one [`IndicatorView`] per
    /// `(symbol, timeframe)`, invalidated alongside the ring it projects.
    fn indicator_view(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&IndicatorView>;
}

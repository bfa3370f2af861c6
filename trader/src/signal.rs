//! `check_signal(symbol)` (spec.md §4.7), grounded on
//! `services/bot/strategies/base/strategy.py::check_signal`.

use crate::config::{IndicatorField, IndicatorRule, IndicatorSpec, StrategyCondition, StrategyRules};
use crate::market_view::MarketView;
use kestrel_data::candles::indicators::{CandlesAggregator, Indicator, IndicatorView};
use kestrel_markets::{OrderSide, PositionSide, Symbol};
use rust_decimal::prelude::ToPrimitive;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// `(position_side, order_side)` group whose triggered-condition count met
/// `rules.conditions_trigger_count` (spec.md §4.7 "group by (position_side,
/// order_side)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalGroup {
    pub position_side: PositionSide,
    pub order_side: OrderSide,
}

/// Reads one indicator field at one candle index (spec.md §4.4's query
/// interface, dispatched by [`IndicatorSpec`]/[`IndicatorField`]).
fn evaluate(view: &IndicatorView, aggregator: &CandlesAggregator, spec: &IndicatorSpec, field: IndicatorField, index: isize) -> Indicator {
    use IndicatorField::*;
    match (spec, field) {
        (IndicatorSpec::Rsi { period }, Value) => view.rsi(aggregator, *period, index),
        (IndicatorSpec::Sma { period }, Value) => view.sma(aggregator, *period, index),
        (IndicatorSpec::Ma { period }, Value) => view.ma(aggregator, *period, index),
        (IndicatorSpec::Ema { period }, Value) => view.ema(aggregator, *period, index),
        (IndicatorSpec::Roc { period }, Value) => view.roc(aggregator, *period, index),
        (IndicatorSpec::Obv, Value) => view.obv(aggregator, index),
        (IndicatorSpec::Stochastic { k_period, d_period }, StochK) => view.stochastic(aggregator, *k_period, *d_period, index).0,
        (IndicatorSpec::Stochastic { k_period, d_period }, StochD) => view.stochastic(aggregator, *k_period, *d_period, index).1,
        (IndicatorSpec::Macd { fast, slow, signal }, MacdLine) => view.macd(aggregator, *fast, *slow, *signal, index).0,
        (IndicatorSpec::Macd { fast, slow, signal }, MacdSignal) => view.macd(aggregator, *fast, *slow, *signal, index).1,
        (IndicatorSpec::Bollinger { length, width }, BollUpper) => {
            view.bollinger(aggregator, *length, width.to_f64().unwrap_or(0.0), index).upper
        }
        (IndicatorSpec::Bollinger { length, width }, BollMa) => view.bollinger(aggregator, *length, width.to_f64().unwrap_or(0.0), index).ma,
        (IndicatorSpec::Bollinger { length, width }, BollLower) => {
            view.bollinger(aggregator, *length, width.to_f64().unwrap_or(0.0), index).lower
        }
        (IndicatorSpec::PumpDumpLevel { lookback }, Value) => view.pump_dump_level(aggregator, *lookback, index),
        (IndicatorSpec::Hammer, Pattern) => bool_to_indicator(view.is_hammer(aggregator, index)),
        (IndicatorSpec::ShootingStar, Pattern) => bool_to_indicator(view.is_shooting_star(aggregator, index)),
        (IndicatorSpec::MorningStar, Pattern) => bool_to_indicator(view.is_morning_star(aggregator, index)),
        (IndicatorSpec::EveningStar, Pattern) => bool_to_indicator(view.is_evening_star(aggregator, index)),
        (IndicatorSpec::Eri { period }, BullPower) => view.eri_bull_power(aggregator, *period, index),
        (IndicatorSpec::Eri { period }, BearPower) => view.eri_bear_power(aggregator, *period, index),
        (IndicatorSpec::Macd { fast, slow, signal }, MacdCrossBullish) => {
            bool_to_indicator(view.macd_bullish_cross(aggregator, *fast, *slow, *signal, index))
        }
        (IndicatorSpec::Macd { fast, slow, signal }, MacdCrossBearish) => {
            bool_to_indicator(view.macd_bearish_cross(aggregator, *fast, *slow, *signal, index))
        }
        (IndicatorSpec::Bollinger { length, width }, BollCrossUpper) => {
            bool_to_indicator(view.bollinger_upper_cross(aggregator, *length, width.to_f64().unwrap_or(0.0), index))
        }
        (IndicatorSpec::Bollinger { length, width }, BollCrossLower) => {
            bool_to_indicator(view.bollinger_lower_cross(aggregator, *length, width.to_f64().unwrap_or(0.0), index))
        }
        (IndicatorSpec::Ichimoku { tenkan_period, kijun_period }, IchimokuBullishCross) => {
            bool_to_indicator(view.ichimoku_bullish_cross(aggregator, *tenkan_period, *kijun_period, index))
        }
        (IndicatorSpec::Ichimoku { tenkan_period, kijun_period }, IchimokuBearishCross) => {
            bool_to_indicator(view.ichimoku_bearish_cross(aggregator, *tenkan_period, *kijun_period, index))
        }
        // A rule mis-pairs a field with an indicator that doesn't produce it
        // (e.g. `StochK` against `Rsi`): undefined, never a match.
        _ => Indicator::Undefined,
    }
}

fn bool_to_indicator(value: bool) -> Indicator {
    if value {
        Indicator::Defined(1.0)
    } else {
        Indicator::Undefined
    }
}

/// `true` iff any rule passes at this index (spec.md §4.7: "first true
/// condition terminates the inner loop").
fn rules_pass_at_index(view: &IndicatorView, aggregator: &CandlesAggregator, spec: &IndicatorSpec, rules: &[IndicatorRule], index: isize) -> bool {
    rules.iter().any(|rule| evaluate(view, aggregator, spec, rule.field, index).compare(rule.op, rule.value))
}

/// One `StrategyCondition` is "triggered" iff any of its rules passes at any
/// of the last `save_signal_candles` closed bars (spec.md §4.7 "for each
/// index in `{-1, -2, ..., -save_signal_candles}`").
fn condition_triggered(market: &dyn MarketView, symbol: &Symbol, condition: &StrategyCondition) -> bool {
    let Some(aggregator) = market.candles(symbol, condition.timeframe) else {
        return false;
    };
    let Some(view) = market.indicator_view(symbol, condition.timeframe) else {
        return false;
    };

    let lookback = condition.save_signal_candles.max(1);
    (1..=lookback).any(|back| rules_pass_at_index(view, aggregator, &condition.indicator, &condition.rules, -(back as isize)))
}

/// `check_signal(symbol)` (spec.md §4.7): evaluates every condition, groups
/// the triggered count by `(position_side, order_side)`, and returns the
/// groups whose count reached `rules.conditions_trigger_count`.
pub fn check_signal(rules: &StrategyRules, market: &dyn MarketView, symbol: &Symbol) -> Vec<SignalGroup> {
    let mut triggered_by_group: HashMap<(PositionSide, OrderSide), HashSet<usize>> = HashMap::new();

    for (index, condition) in rules.conditions.iter().enumerate() {
        if condition_triggered(market, symbol, condition) {
            triggered_by_group
                .entry((condition.position_side, condition.order_side))
                .or_default()
                .insert(index);
        }
    }

    let groups: Vec<SignalGroup> = triggered_by_group
        .into_iter()
        .filter(|(_, indicators)| indicators.len() >= rules.conditions_trigger_count)
        .map(|((position_side, order_side), _)| SignalGroup { position_side, order_side })
        .collect();

    debug!(symbol = %symbol, groups = groups.len(), "signal evaluation complete");
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use kestrel_data::candles::indicators::CompareOp;
    use kestrel_markets::Timeframe;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;
    use std::collections::HashMap as Map;

    struct FakeMarket {
        candles: RefCell<Map<(Symbol, Timeframe), CandlesAggregator>>,
        views: Map<(Symbol, Timeframe), IndicatorView>,
    }

    impl MarketView for FakeMarket {
        fn contract(&self, _symbol: &Symbol) -> Option<&kestrel_markets::Contract> {
            None
        }

        fn book(&self, _symbol: &Symbol) -> Option<kestrel_data::event::BookUpdate> {
            None
        }

        fn candles(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&CandlesAggregator> {
            // Safety valve for the test double only: we need a stable
            // reference out of a RefCell, which is unsound in general but
            // fine here since the map is populated once up-front and never
            // mutated again through this accessor.
            let ptr = self.candles.borrow().get(&(symbol.clone(), timeframe))? as *const CandlesAggregator;
            Some(unsafe { &*ptr })
        }

        fn indicator_view(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<&IndicatorView> {
            self.views.get(&(symbol.clone(), timeframe))
        }
    }

    fn strategy_rules(conditions: Vec<StrategyCondition>, trigger_count: usize) -> StrategyRules {
        StrategyRules {
            id: "s1".into(),
            name: "test".into(),
            credentials: Credentials { api_key: "k".into(), api_secret: "s".into() },
            symbols: vec![Symbol::new("btcusdt")],
            leverage: 1,
            balance_stake: dec!(0.1),
            trailing: false,
            trailing_callback_rate: None,
            stop_loss: None,
            take_profit: None,
            conditions,
            conditions_trigger_count: trigger_count,
        }
    }

    #[test]
    fn triggers_group_once_threshold_reached() {
        let symbol = Symbol::new("btcusdt");
        let mut agg = CandlesAggregator::new(Timeframe::M1, 50);
        // RSI(14) all-gains -> pegged at 100, so `Gte 50` passes.
        for i in 0..30 {
            agg.update(rust_decimal::Decimal::from(100 + i), dec!(1), i as i64 * 60_000);
        }

        let mut candles = Map::new();
        candles.insert((symbol.clone(), Timeframe::M1), agg);
        let mut views = Map::new();
        views.insert((symbol.clone(), Timeframe::M1), IndicatorView::new());
        let market = FakeMarket { candles: RefCell::new(candles), views };

        let condition = StrategyCondition {
            position_side: PositionSide::Long,
            order_side: OrderSide::Buy,
            timeframe: Timeframe::M1,
            indicator: IndicatorSpec::Rsi { period: 14 },
            save_signal_candles: 1,
            rules: vec![IndicatorRule { field: IndicatorField::Value, op: CompareOp::Gte, value: 50.0 }],
        };
        let rules = strategy_rules(vec![condition], 1);

        let groups = check_signal(&rules, &market, &symbol);
        assert_eq!(groups, vec![SignalGroup { position_side: PositionSide::Long, order_side: OrderSide::Buy }]);
    }

    #[test]
    fn below_threshold_count_does_not_trigger() {
        let symbol = Symbol::new("btcusdt");
        let agg = CandlesAggregator::new(Timeframe::M1, 50);
        let mut candles = Map::new();
        candles.insert((symbol.clone(), Timeframe::M1), agg);
        let mut views = Map::new();
        views.insert((symbol.clone(), Timeframe::M1), IndicatorView::new());
        let market = FakeMarket { candles: RefCell::new(candles), views };

        let condition = StrategyCondition {
            position_side: PositionSide::Long,
            order_side: OrderSide::Buy,
            timeframe: Timeframe::M1,
            indicator: IndicatorSpec::Rsi { period: 14 },
            save_signal_candles: 1,
            rules: vec![IndicatorRule { field: IndicatorField::Value, op: CompareOp::Gte, value: 50.0 }],
        };
        // threshold 2, only 1 condition defined -> never reachable.
        let rules = strategy_rules(vec![condition], 2);

        assert!(check_signal(&rules, &market, &symbol).is_empty());
    }
}

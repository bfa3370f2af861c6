//! `StrategyRules`, spec.md §6.4's per-strategy configuration block: the
//! user-configured rule set a [`crate::strategy::Strategy`] evaluates.
//! Grounded on `services/bot/strategies/base/strategy.py`'s constructor
//! arguments.

use kestrel_data::candles::indicators::CompareOp;
use kestrel_markets::{OrderSide, PositionSide, Symbol, Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-strategy venue credentials (SPEC_FULL "Per-strategy credential
/// isolation": each `Strategy` owns its own, rather than sharing one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// One step of a take-profit ladder (spec.md §4.7 "Take-profit check").
/// `level` is a fractional gain over `entry_price`; `stake` is the fraction
/// of `total_quantity` this step exits. A rule set's steps must sum their
/// `stake` to `1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitStep {
    pub level: Decimal,
    pub stake: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitRule {
    pub steps: Vec<TakeProfitStep>,
}

/// spec.md §4.7 "Stop-loss check": `rate` is the fractional loss from
/// `entry_price` that triggers a full close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossRule {
    pub rate: Decimal,
}

/// The technical-indicator interface consumed by `check_signal` (spec.md
/// §4.4/§4.7). Parameters mirror [`kestrel_data::candles::indicators::IndicatorView`]'s
/// query methods one-to-one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorSpec {
    Rsi { period: usize },
    Sma { period: usize },
    Ema { period: usize },
    Ma { period: usize },
    Roc { period: usize },
    Obv,
    Stochastic { k_period: usize, d_period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { length: usize, width: Decimal },
    PumpDumpLevel { lookback: usize },
    Hammer,
    ShootingStar,
    MorningStar,
    EveningStar,
    /// Elder Ray Index (spec.md §4.4 "ERI"): bull/bear power over an EMA
    /// baseline of `period`.
    Eri { period: usize },
    /// Tenkan/kijun conversion-base-line cross (spec.md §4.4 "Ichimoku
    /// signals").
    Ichimoku { tenkan_period: usize, kijun_period: usize },
}

/// Which scalar field of a (possibly multi-output) indicator a
/// [`IndicatorRule`] compares. Single-output indicators only ever use
/// `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorField {
    Value,
    StochK,
    StochD,
    MacdLine,
    MacdSignal,
    BollUpper,
    BollMa,
    BollLower,
    /// A candlestick-pattern predicate: `Defined(1.0)` when it holds,
    /// `Undefined` otherwise (spec.md §4.4 pattern predicates "always
    /// compare false" when not defined).
    Pattern,
    BullPower,
    BearPower,
    MacdCrossBullish,
    MacdCrossBearish,
    BollCrossUpper,
    BollCrossLower,
    IchimokuBullishCross,
    IchimokuBearishCross,
}

/// One `(field, op, value)` comparison spec.md §4.7 `check_signal` evaluates
/// against an indicator read at a given candle index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub field: IndicatorField,
    pub op: CompareOp,
    pub value: f64,
}

/// One `StrategyCondition` (spec.md §4.7): an indicator on a timeframe,
/// scanned over the last `save_signal_candles` closed bars, whose rules are
/// OR'd together (spec.md "first true condition terminates the inner loop").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCondition {
    pub position_side: PositionSide,
    pub order_side: OrderSide,
    pub timeframe: Timeframe,
    pub indicator: IndicatorSpec,
    /// How many of the most recent closed candles (`-1..=-save_signal_candles`)
    /// to scan before giving up on this condition.
    pub save_signal_candles: usize,
    pub rules: Vec<IndicatorRule>,
}

/// spec.md §6.4 "Per strategy" configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRules {
    pub id: String,
    pub name: String,
    pub credentials: Credentials,
    pub symbols: Vec<Symbol>,
    /// `[1, 25]` (spec.md §6.3 `change_leverage`).
    pub leverage: u32,
    /// `(0, 1]`: fraction of quote-asset wallet balance staked per entry.
    pub balance_stake: Decimal,
    pub trailing: bool,
    /// `(0, 0.02]` when `trailing` is set.
    pub trailing_callback_rate: Option<Decimal>,
    pub stop_loss: Option<StopLossRule>,
    pub take_profit: Option<TakeProfitRule>,
    pub conditions: Vec<StrategyCondition>,
    pub conditions_trigger_count: usize,
}

impl StrategyRules {
    /// `true` iff `take_profit`'s ladder stakes sum to exactly `1` (spec.md
    /// §4.7 "a configurable ladder ... Σ stake == 1"), within a fixed-point
    /// epsilon tolerance.
    pub fn take_profit_ladder_is_valid(&self) -> bool {
        match &self.take_profit {
            None => true,
            Some(rule) => {
                let total: Decimal = rule.steps.iter().map(|s| s.stake).sum();
                (total - Decimal::ONE).abs() < Decimal::new(1, 6)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_rules(steps: Vec<TakeProfitStep>) -> StrategyRules {
        StrategyRules {
            id: "s1".into(),
            name: "test".into(),
            credentials: Credentials {
                api_key: "k".into(),
                api_secret: "s".into(),
            },
            symbols: vec![Symbol::new("btcusdt")],
            leverage: 5,
            balance_stake: dec!(0.1),
            trailing: false,
            trailing_callback_rate: None,
            stop_loss: None,
            take_profit: Some(TakeProfitRule { steps }),
            conditions: Vec::new(),
            conditions_trigger_count: 1,
        }
    }

    #[test]
    fn ladder_must_sum_to_one() {
        let valid = base_rules(vec![
            TakeProfitStep { level: dec!(0.005), stake: dec!(0.5) },
            TakeProfitStep { level: dec!(0.008), stake: dec!(0.5) },
        ]);
        assert!(valid.take_profit_ladder_is_valid());

        let invalid = base_rules(vec![TakeProfitStep { level: dec!(0.005), stake: dec!(0.4) }]);
        assert!(!invalid.take_profit_ladder_is_valid());
    }
}

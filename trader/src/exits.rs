//! Stop-loss and take-profit exit checks (spec.md §4.7 "Stop-loss check" /
//! "Take-profit check"), grounded on
//! `services/bot/strategies/base/strategy.py::check_stop_loss`/`check_take_profit`.

use crate::config::{StopLossRule, TakeProfitRule};
use kestrel_execution::model::position::Position;
use kestrel_markets::OrderSide;
use rust_decimal::Decimal;

/// Current mark price a position's side exits against: the bid closes a
/// long, the ask closes a short.
fn exit_price(position: &Position, current_bid: Decimal, current_ask: Decimal) -> Decimal {
    match position.side.exit_order_side() {
        OrderSide::Sell => current_bid,
        OrderSide::Buy => current_ask,
    }
}

/// `true` iff the position's unrealized loss from `entry_price` has reached
/// `rule.rate` (spec.md §4.7 "Stop-loss check"): full close, no ladder.
pub fn stop_loss_triggered(position: &Position, rule: &StopLossRule, current_bid: Decimal, current_ask: Decimal) -> bool {
    if position.entry_price.is_zero() {
        return false;
    }
    let price = exit_price(position, current_bid, current_ask);
    let move_fraction = match position.side.exit_order_side() {
        // Long exits by selling: loss is price falling below entry.
        OrderSide::Sell => (position.entry_price - price) / position.entry_price,
        // Short exits by buying: loss is price rising above entry.
        OrderSide::Buy => (price - position.entry_price) / position.entry_price,
    };
    move_fraction >= rule.rate
}

/// The ladder step a take-profit check should fire next, or `None` if no
/// step's `level` has been reached yet (spec.md §4.7 "Take-profit check").
/// `exited_so_far` approximates spec's "count of exit orders executed" via
/// the exited proportion of `total_quantity`, since `Position` tracks
/// cumulative quantity rather than a discrete step counter.
///
/// Returns the quantity to exit now, rounded to `lot_size` like an entry. A
/// slice whose own notional falls short of `min_notional` is bumped up to
/// `min_notional / price` first (spec.md §4.7 "adjusted upward ... if the
/// raw slice is too small"); if the *remainder* left after that would itself
/// clear below `min_notional`, the whole remaining position is taken instead
/// (spec.md §4.7 "a trailing remainder too small to clear `min_notional` is
/// closed in full rather than left dangling").
pub fn take_profit_step(
    position: &Position,
    rule: &TakeProfitRule,
    current_bid: Decimal,
    current_ask: Decimal,
    min_notional: Decimal,
    lot_size: Decimal,
) -> Option<Decimal> {
    if position.entry_price.is_zero() || position.quantity.is_zero() {
        return None;
    }
    let price = exit_price(position, current_bid, current_ask);
    let gain_fraction = match position.side.exit_order_side() {
        OrderSide::Sell => (price - position.entry_price) / position.entry_price,
        OrderSide::Buy => (position.entry_price - price) / position.entry_price,
    };

    let exited_so_far = position.total_quantity - position.quantity;
    let mut cumulative_target = Decimal::ZERO;

    for step in &rule.steps {
        let step_target = position.total_quantity * step.stake;
        cumulative_target += step_target;

        if cumulative_target <= exited_so_far {
            // Already executed.
            continue;
        }
        if gain_fraction < step.level {
            return None;
        }

        let mut slice = (cumulative_target - exited_so_far).min(position.quantity);
        // Bump the raw slice up to the smallest notional the venue accepts
        // (spec.md §4.7 "adjusted upward to `min_notional / price` if the
        // raw slice is too small").
        if slice * price < min_notional {
            slice = (min_notional / price).min(position.quantity);
        }

        let remainder = position.quantity - slice;
        let remainder_notional = remainder * price;

        let quantity = if remainder.is_zero() || remainder_notional < min_notional {
            position.quantity
        } else {
            slice
        };
        return Some(position_contract_round(quantity, lot_size));
    }

    None
}

/// Rounds a take-profit exit quantity to the contract's lot size, mirroring
/// the rounding `calc_trade_quantity` applies to entries (spec.md §4.7).
fn position_contract_round(quantity: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size.is_zero() {
        return quantity;
    }
    (quantity / lot_size).round() * lot_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_markets::{PositionSide, Symbol};
    use rust_decimal_macros::dec;

    fn long_position(entry_price: Decimal, quantity: Decimal, total_quantity: Decimal) -> Position {
        Position {
            id: "p1".into(),
            symbol: Symbol::new("btcusdt"),
            side: PositionSide::Long,
            strategy_id: "s1".into(),
            status: kestrel_execution::model::position::PositionStatus::Open,
            quantity,
            total_quantity,
            entry_price,
            exit_price: Decimal::ZERO,
            orders: Vec::new(),
            create_ts: 0,
            update_ts: 0,
        }
    }

    #[test]
    fn stop_loss_triggers_on_configured_drawdown() {
        let position = long_position(dec!(20000), dec!(1), dec!(1));
        let rule = StopLossRule { rate: dec!(0.02) };
        assert!(!stop_loss_triggered(&position, &rule, dec!(19700), dec!(19701)));
        assert!(stop_loss_triggered(&position, &rule, dec!(19600), dec!(19601)));
    }

    #[test]
    fn take_profit_ladder_matches_spec_scenario() {
        // S6: entry=20000, total_qty=1, steps=[(0.005,0.5),(0.008,0.5)], min_notional=5.
        let rule = TakeProfitRule {
            steps: vec![
                crate::config::TakeProfitStep { level: dec!(0.005), stake: dec!(0.5) },
                crate::config::TakeProfitStep { level: dec!(0.008), stake: dec!(0.5) },
            ],
        };

        let position = long_position(dec!(20000), dec!(1), dec!(1));
        // step1 at bid=20100 (+0.5%) exits 0.5
        let step1 = take_profit_step(&position, &rule, dec!(20100), dec!(20101), dec!(5), dec!(0.001));
        assert_eq!(step1, Some(dec!(0.5)));

        let mut position = position;
        position.quantity -= dec!(0.5);
        // step2 at bid=20160 (+0.8%) exits remaining 0.5 and closes.
        let step2 = take_profit_step(&position, &rule, dec!(20160), dec!(20161), dec!(5), dec!(0.001));
        assert_eq!(step2, Some(dec!(0.5)));
    }

    #[test]
    fn dangling_remainder_below_min_notional_closes_in_full() {
        let rule = TakeProfitRule {
            steps: vec![
                crate::config::TakeProfitStep { level: dec!(0.005), stake: dec!(0.5) },
                crate::config::TakeProfitStep { level: dec!(0.008), stake: dec!(0.5) },
            ],
        };
        // Low-priced contract: step1's 0.5 remainder would only be worth
        // 0.5 * 8.1 = 4.05, below min_notional(5) -- collapse into a full
        // close instead of leaving that remainder dangling.
        let position = long_position(dec!(8), dec!(1), dec!(1));
        let step = take_profit_step(&position, &rule, dec!(8.1), dec!(8.101), dec!(5), dec!(0.001));
        assert_eq!(step, Some(dec!(1)));
    }

    #[test]
    fn raw_slice_below_min_notional_bumps_up_to_min_notional_over_price() {
        let rule = TakeProfitRule {
            steps: vec![
                crate::config::TakeProfitStep { level: dec!(0.005), stake: dec!(0.001) },
                crate::config::TakeProfitStep { level: dec!(0.5), stake: dec!(0.999) },
            ],
        };
        // raw slice = 10 * 0.001 = 0.01, notional = 0.01 * 101 = 1.01, below
        // min_notional(5) -- bumped up to 5/101 before the remainder check
        // (spec.md §4.7 "adjusted upward to `min_notional / price`"), then
        // rounded to lot_size like an entry.
        let position = long_position(dec!(100), dec!(10), dec!(10));
        let step = take_profit_step(&position, &rule, dec!(101), dec!(101.1), dec!(5), dec!(0.001));
        assert_eq!(step, Some(dec!(0.050)));
    }
}

use crate::{exchange::ExchangeId, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-symbol trading rules (spec.md §3, `Contract`).
///
/// Immutable for the lifetime of a run; refreshed only on process start via
/// `PublicRest::get_contracts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub base_asset: String,
    pub quote_asset: String,
    pub price_decimals: u32,
    pub quantity_decimals: u32,
    pub tick_size: Decimal,
    pub lot_size: Decimal,
    pub min_notional: Decimal,
}

impl Contract {
    /// Rounds `quantity` to the nearest multiple of [`Contract::lot_size`],
    /// the rounding rule `calc_trade_quantity` applies (spec.md §4.7 literal
    /// formula `round(raw_qty / contract.lot_size) * contract.lot_size`).
    pub fn round_to_lot_size(&self, quantity: Decimal) -> Decimal {
        if self.lot_size.is_zero() {
            return quantity;
        }
        (quantity / self.lot_size).round() * self.lot_size
    }

    /// `true` iff `quantity * price >= min_notional` (spec.md Invariant/Testable
    /// Property 8).
    pub fn satisfies_min_notional(&self, quantity: Decimal, price: Decimal) -> bool {
        quantity * price >= self.min_notional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contract() -> Contract {
        Contract {
            exchange: ExchangeId::Binance,
            symbol: Symbol::new("BTCUSDT"),
            base_asset: "BTC".into(),
            quote_asset: "USDT".into(),
            price_decimals: 2,
            quantity_decimals: 3,
            tick_size: dec!(0.01),
            lot_size: dec!(0.001),
            min_notional: dec!(5),
        }
    }

    #[test]
    fn rounds_to_nearest_lot_size() {
        let c = contract();
        // 0.00249 / 0.001 = 2.49 -> rounds down to 2 -> 0.002.
        assert_eq!(c.round_to_lot_size(dec!(0.00249)), dec!(0.002));
        // 0.2499875 / 0.001 = 249.9875 -> rounds up to 250 -> 0.250.
        assert_eq!(c.round_to_lot_size(dec!(0.2499875)), dec!(0.250));
    }

    #[test]
    fn min_notional_guard() {
        let c = contract();
        assert!(!c.satisfies_min_notional(dec!(0.0001), dec!(20000)));
        assert!(c.satisfies_min_notional(dec!(0.001), dec!(20000)));
    }
}

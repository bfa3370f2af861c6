use super::RiskCheck;
use derive_more::Constructor;
use kestrel_markets::Contract;
use rust_decimal::Decimal;
use thiserror::Error;

/// Checks that a quantity is already an exact multiple of the contract's lot
/// size (use [`Contract::round_to_lot_size`] to produce one before calling
/// this, per spec.md §4.7).
#[derive(Debug, Clone, Constructor)]
pub struct LotSizeCheck<'a> {
    pub contract: &'a Contract,
}

impl RiskCheck for LotSizeCheck<'_> {
    type Input = Decimal;
    type Error = LotSizeError;

    fn name() -> &'static str {
        "LotSize"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        let lot = self.contract.lot_size;
        if lot.is_zero() || (input % lot).is_zero() {
            Ok(())
        } else {
            Err(LotSizeError {
                quantity: *input,
                lot_size: lot,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("quantity {quantity} is not a multiple of lot size {lot_size}")]
pub struct LotSizeError {
    pub quantity: Decimal,
    pub lot_size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_markets::{ExchangeId, Symbol};
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
    fn accepts_exact_multiples() {
        let c = contract();
        let check = LotSizeCheck::new(&c);
        assert!(check.check(&dec!(0.003)).is_ok());
    }

    #[test]
    fn rejects_fractional_lots() {
        let c = contract();
        let check = LotSizeCheck::new(&c);
        assert!(check.check(&dec!(0.0035)).is_err());
    }
}

use super::RiskCheck;
use derive_more::Constructor;
use kestrel_markets::Contract;
use rust_decimal::Decimal;
use thiserror::Error;

/// Proposed trade quantity and price to validate against a [`Contract`]'s
/// `min_notional` (spec.md §4.7 `calc_trade_quantity`, Testable Property 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotionalInput {
    pub quantity: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, Constructor)]
pub struct MinNotionalCheck<'a> {
    pub contract: &'a Contract,
}

impl RiskCheck for MinNotionalCheck<'_> {
    type Input = NotionalInput;
    type Error = MinNotionalError;

    fn name() -> &'static str {
        "MinNotional"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if self
            .contract
            .satisfies_min_notional(input.quantity, input.price)
        {
            Ok(())
        } else {
            Err(MinNotionalError {
                notional: input.quantity * input.price,
                min_notional: self.contract.min_notional,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("notional {notional} below contract minimum {min_notional}")]
pub struct MinNotionalError {
    pub notional: Decimal,
    pub min_notional: Decimal,
}

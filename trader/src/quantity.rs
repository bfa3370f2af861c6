//! `calc_trade_quantity` (spec.md §4.7), grounded on
//! `services/bot/strategies/base/strategy.py::calc_trade_quantity`.

use kestrel_data::event::BookUpdate;
use kestrel_execution::model::account::Account;
use kestrel_markets::{Contract, OrderSide};
use kestrel_risk::check::{MinNotionalCheck, MinNotionalError, NotionalInput, RiskCheck};
use rust_decimal::Decimal;

/// Entry price `calc_trade_quantity` uses for `side` (spec.md §4.7 literal
/// formula: `book.bid` when buying, `book.ask` when selling).
fn entry_price(book: &BookUpdate, side: OrderSide) -> Decimal {
    match side {
        OrderSide::Buy => book.bid,
        OrderSide::Sell => book.ask,
    }
}

/// Sizes an entry order from wallet balance, stake fraction and leverage,
/// rounds to the contract's lot size, and validates the result against
/// `min_notional` via [`MinNotionalCheck`] (spec.md Testable Property 8 —
/// reuses `kestrel-risk` rather than re-implementing the check).
pub fn calc_trade_quantity(
    contract: &Contract,
    account: &Account,
    book: &BookUpdate,
    side: OrderSide,
    balance_stake: Decimal,
    leverage: u32,
) -> Result<Decimal, MinNotionalError> {
    let price = entry_price(book, side);
    let balance = account.balance_of(&contract.quote_asset);
    let raw_quantity = balance * balance_stake * Decimal::from(leverage) / price;
    let quantity = contract.round_to_lot_size(raw_quantity);

    let check = MinNotionalCheck::new(contract);
    check.check(&NotionalInput { quantity, price })?;
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_execution::model::account::AssetBalance;
    use kestrel_markets::exchange::ExchangeId;
    use kestrel_markets::Symbol;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

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

    fn account(wallet_balance: Decimal) -> Account {
        let mut balances = HashMap::new();
        balances.insert(
            "USDT".to_string(),
            AssetBalance { wallet_balance, available_balance: wallet_balance },
        );
        Account { balances, positions: Vec::new() }
    }

    #[test]
    fn sizes_and_rounds_to_lot_size() {
        let quantity = calc_trade_quantity(
            &contract(),
            &account(dec!(10000)),
            &BookUpdate::new(dec!(20001), dec!(20003)),
            OrderSide::Buy,
            dec!(0.1),
            5,
        )
        .unwrap();
        // balance=10000, stake=0.1, leverage=5, price=20001(bid) -> raw=0.2499875...
        // / lot_size(0.001) = 249.9875 -> rounds up to 250 -> 0.250.
        assert_eq!(quantity, dec!(0.250));
    }

    #[test]
    fn rejects_below_min_notional() {
        let result = calc_trade_quantity(
            &contract(),
            &account(dec!(1)),
            &BookUpdate::new(dec!(19999), dec!(20001)),
            OrderSide::Buy,
            dec!(0.0001),
            1,
        );
        assert!(result.is_err());
    }
}

//! Startup reconciliation (spec.md §4.8), grounded on
//! `services/bot/strategies/base/strategy.py::reconcile_positions`.
//!
//! Compares the durable store's record of a strategy's open positions
//! against what the venue account itself reports, before any command is
//! ever enqueued.

use kestrel_execution::model::account::{Account, AccountPosition};
use kestrel_execution::model::{Order, Position, PositionStatus};
use kestrel_markets::Symbol;
use kestrel_store::{Filter, Store, StoreError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Per-symbol outcome of [`reconcile`] (spec.md §4.8/§7 "Reconciliation
/// mismatch"): either the store's open position for that symbol matches the
/// venue exactly and can be loaded into `LocalStorage`, or it doesn't and the
/// symbol is marked busy instead of guessed at.
#[derive(Debug)]
pub enum ReconciliationOutcome {
    Matched(Position),
    NoOpenPosition,
    Mismatched,
}

/// `true` iff `stored` and `venue` agree on quantity and entry price, the
/// latter compared at the contract's own price precision (spec.md §4.8
/// "entry price rounded to the contract's tick precision").
fn positions_match(stored: &Position, venue: &AccountPosition, price_decimals: u32) -> bool {
    let rounded_stored = stored.entry_price.round_dp(price_decimals);
    let rounded_venue = venue.entry_price.round_dp(price_decimals);
    stored.quantity == venue.quantity && rounded_stored == rounded_venue
}

/// Reconciles every symbol a strategy owns (spec.md §4.8): fetches the
/// store's most recent open position per symbol, fetches that symbol's
/// orders, and compares against the live `Account`. On mismatch the symbol
/// is reported as [`ReconciliationOutcome::Mismatched`] rather than
/// force-resolved; callers (`Strategy::startup`) mark it busy.
pub async fn reconcile(
    strategy_id: &str,
    symbols: &[Symbol],
    price_decimals_by_symbol: &HashMap<Symbol, u32>,
    account: &Account,
    position_store: &Arc<dyn Store<Position>>,
) -> Result<HashMap<Symbol, ReconciliationOutcome>, StoreError> {
    let mut outcomes = HashMap::new();

    for symbol in symbols {
        let filter: Filter = vec![
            ("symbol", bson::to_bson(symbol).unwrap()),
            ("strategy_id", bson::to_bson(strategy_id).unwrap()),
            ("status", bson::to_bson(&PositionStatus::Open).unwrap()),
        ];
        let mut stored_positions = position_store.find(filter).await?;

        let venue_position = account.positions.iter().find(|p| &p.symbol == symbol && p.quantity > Decimal::ZERO);

        let outcome = match (stored_positions.pop(), venue_position) {
            (None, None) => ReconciliationOutcome::NoOpenPosition,
            (None, Some(_)) | (Some(_), None) => ReconciliationOutcome::Mismatched,
            (Some(stored), Some(venue)) => {
                let price_decimals = price_decimals_by_symbol.get(symbol).copied().unwrap_or(8);
                if positions_match(&stored, venue, price_decimals) {
                    ReconciliationOutcome::Matched(stored)
                } else {
                    ReconciliationOutcome::Mismatched
                }
            }
        };

        if matches!(outcome, ReconciliationOutcome::Mismatched) {
            warn!(%symbol, "startup reconciliation mismatch, marking symbol busy");
        }
        outcomes.insert(symbol.clone(), outcome);
    }

    Ok(outcomes)
}

/// Fetches every still-open order belonging to `position` (spec.md §4.8
/// "seed local storage with positions and orders"), needed to repopulate
/// `LocalStorage::seed`'s order cache alongside the matched position.
pub async fn orders_for_position(position: &Position, order_store: &Arc<dyn Store<Order>>) -> Result<Vec<Order>, StoreError> {
    let filter: Filter = vec![("symbol", bson::to_bson(&position.symbol).unwrap())];
    let orders = order_store.find(filter).await?;
    Ok(orders.into_iter().filter(|o| position.orders.contains(&o.id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_execution::model::account::AssetBalance;
    use kestrel_markets::PositionSide;
    use kestrel_store::memory::InMemoryStore;
    use rust_decimal_macros::dec;

    fn stored_position(symbol: Symbol, quantity: Decimal, entry_price: Decimal) -> Position {
        Position {
            id: "p1".into(),
            symbol,
            side: PositionSide::Long,
            strategy_id: "s1".into(),
            status: PositionStatus::Open,
            quantity,
            total_quantity: quantity,
            entry_price,
            exit_price: Decimal::ZERO,
            orders: Vec::new(),
            create_ts: 0,
            update_ts: 0,
        }
    }

    #[tokio::test]
    async fn matching_positions_reconcile() {
        let symbol = Symbol::new("btcusdt");
        let store: Arc<dyn Store<Position>> = Arc::new(InMemoryStore::<Position>::new());
        store.create(&stored_position(symbol.clone(), dec!(1), dec!(20000))).await.unwrap();

        let account = Account {
            balances: HashMap::from([("USDT".to_string(), AssetBalance { wallet_balance: dec!(1000), available_balance: dec!(1000) })]),
            positions: vec![AccountPosition {
                symbol: symbol.clone(),
                side: PositionSide::Long,
                quantity: dec!(1),
                entry_price: dec!(20000),
                isolated: false,
                margin: dec!(100),
                leverage: 10,
            }],
        };

        let mut decimals = HashMap::new();
        decimals.insert(symbol.clone(), 2);

        let outcomes = reconcile("s1", &[symbol.clone()], &decimals, &account, &store).await.unwrap();
        assert!(matches!(outcomes.get(&symbol), Some(ReconciliationOutcome::Matched(_))));
    }

    #[tokio::test]
    async fn mismatched_quantity_marks_busy() {
        let symbol = Symbol::new("btcusdt");
        let store: Arc<dyn Store<Position>> = Arc::new(InMemoryStore::<Position>::new());
        store.create(&stored_position(symbol.clone(), dec!(1), dec!(20000))).await.unwrap();

        let account = Account {
            balances: HashMap::new(),
            positions: vec![AccountPosition {
                symbol: symbol.clone(),
                side: PositionSide::Long,
                quantity: dec!(2),
                entry_price: dec!(20000),
                isolated: false,
                margin: dec!(100),
                leverage: 10,
            }],
        };

        let decimals = HashMap::new();
        let outcomes = reconcile("s1", &[symbol.clone()], &decimals, &account, &store).await.unwrap();
        assert!(matches!(outcomes.get(&symbol), Some(ReconciliationOutcome::Mismatched)));
    }

    #[tokio::test]
    async fn no_positions_either_side_is_clean() {
        let symbol = Symbol::new("btcusdt");
        let store: Arc<dyn Store<Position>> = Arc::new(InMemoryStore::<Position>::new());
        let account = Account::default();
        let decimals = HashMap::new();

        let outcomes = reconcile("s1", &[symbol.clone()], &decimals, &account, &store).await.unwrap();
        assert!(matches!(outcomes.get(&symbol), Some(ReconciliationOutcome::NoOpenPosition)));
    }
}

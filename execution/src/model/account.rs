//! `Account` / `AccountPosition` (spec.md §3), hydrated at start and patched
//! by the user stream. Grounded on `modules/models/account.py`.

use kestrel_markets::{PositionSide, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub wallet_balance: Decimal,
    pub available_balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginType {
    Isolated,
    Crossed,
}

/// spec.md §3 `AccountPosition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub isolated: bool,
    pub margin: Decimal,
    pub leverage: u32,
}

/// spec.md §3 `Account`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub balances: HashMap<String, AssetBalance>,
    pub positions: Vec<AccountPosition>,
}

impl Account {
    pub fn balance_of(&self, asset: &str) -> Decimal {
        self.balances
            .get(asset)
            .map(|b| b.wallet_balance)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn position_of(&self, symbol: &Symbol, side: PositionSide) -> Option<&AccountPosition> {
        self.positions
            .iter()
            .find(|p| &p.symbol == symbol && p.side == side)
    }

    /// Applies an account-update user-stream event: full balance/position
    /// replace for whichever entries are present (spec.md §2 "consumes user-
    /// stream events (account/order updates) for reconciliation").
    pub fn apply_update(&mut self, balances: Vec<(String, AssetBalance)>, positions: Vec<AccountPosition>) {
        for (asset, balance) in balances {
            self.balances.insert(asset, balance);
        }
        for updated in positions {
            if let Some(existing) = self
                .positions
                .iter_mut()
                .find(|p| p.symbol == updated.symbol && p.side == updated.side)
            {
                *existing = updated;
            } else {
                self.positions.push(updated);
            }
        }
    }
}

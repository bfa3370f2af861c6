//! Venue identifier.
//!
//! spec.md §1 is explicit that this system targets a single venue; `ExchangeId`
//! stays an enum (rather than a unit struct) only so the shape matches the
//! wider ecosystem convention and leaves room to add a venue later without a
//! breaking change.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum ExchangeId {
    Binance,
    BinanceTestnet,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::BinanceTestnet => "binance_testnet",
        }
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

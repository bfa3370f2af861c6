// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The opposite side, used when mirroring BUY-side logic (trailing stop,
    /// stop-loss, take-profit) onto SELL per spec.md §4.6/§4.7.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Net position direction held under hedge mode (spec.md §3, `AccountPosition`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

impl PositionSide {
    /// The [`OrderSide`] that *opens*/adds to this position side.
    ///
    /// LONG <-> BUY, SHORT <-> SELL (spec.md §4.6 "Position update on fill").
    pub fn entry_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long | PositionSide::Both => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// The [`OrderSide`] that *closes*/reduces this position side.
    pub fn exit_order_side(&self) -> OrderSide {
        self.entry_order_side().opposite()
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Both => write!(f, "BOTH"),
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

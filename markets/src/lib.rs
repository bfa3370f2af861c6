// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::too_many_arguments)]
//! # Markets - Shared Trading Vocabulary
//!
//! Exchange-agnostic value types shared by every other crate in the Kestrel
//! ecosystem: the venue identifier, a symbol's trading [`Contract`], order
//! sides, position sides, and the closed set of supported [`Timeframe`]s.
//!
//! Nothing in this crate performs I/O; it only defines the vocabulary other
//! crates build on.

pub mod contract;
pub mod exchange;
pub mod side;
pub mod timeframe;

pub use contract::Contract;
pub use exchange::ExchangeId;
pub use side::{OrderSide, PositionSide};
pub use timeframe::Timeframe;

/// A venue trading symbol, e.g. `"BTCUSDT"`.
///
/// A thin [`smol_str::SmolStr`] newtype: symbols are short, long-lived, and
/// cloned constantly (once per market event), so the small-string
/// optimisation matters.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize,
)]
pub struct Symbol(pub smol_str::SmolStr);

impl Symbol {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(smol_str::SmolStr::new(symbol.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(smol_str::SmolStr::new(value))
    }
}

// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
//! # Trader - Strategy Runtime
//!
//! spec.md §4.7/§4.8: a [`strategy::Strategy`] holds a [`config::StrategyRules`]
//! rule set, runs the startup sequence, evaluates signals on candle ticks and
//! stop-loss/take-profit on book ticks, and hands the resulting intents to
//! its own [`kestrel_execution::command::CommandHandler`].
//!
//! * [`config`] — [`config::StrategyRules`] and everything it's built from
//!   (spec.md §6.4).
//! * [`market_view`] — [`market_view::MarketView`], the read-only seam onto
//!   `kestrel_core::ExchangeState` this crate depends on instead of the
//!   other way around.
//! * [`signal`] — `check_signal` (spec.md §4.7).
//! * [`quantity`] — `calc_trade_quantity` (spec.md §4.7).
//! * [`exits`] — stop-loss / take-profit checks (spec.md §4.7).
//! * [`reconcile`] — startup reconciliation (spec.md §4.8).
//! * [`strategy`] — [`strategy::Strategy`], wiring all of the above into the
//!   callback-driven runtime spec.md §4.7's startup sequence describes.

pub mod config;
pub mod error;
pub mod exits;
pub mod market_view;
pub mod quantity;
pub mod reconcile;
pub mod signal;
pub mod strategy;

pub use config::StrategyRules;
pub use error::TraderError;
pub use strategy::Strategy;

// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
//! # Risk - Pre-Trade Checks
//!
//! The spec.md core does not include a general position/exposure risk
//! manager (that sits above this system); what it does need is the handful
//! of pre-trade checks `calc_trade_quantity` (spec.md §4.7) runs before a
//! `PlaceOrder` command is ever enqueued: the quantity must round to a whole
//! number of lots, and the resulting notional must clear the contract's
//! minimum.
//!
//! [`check::RiskCheck`] is the general interface; [`check::MinNotionalCheck`]
//! and [`check::LotSizeCheck`] are the two concrete checks this system uses.

pub mod check;

pub use check::{LotSizeCheck, MinNotionalCheck, RiskCheck};

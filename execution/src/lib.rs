// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
//! # Execution - Venue Adapter, Order/Position Model, Command State Machine
//!
//! Everything between "a strategy decided to act" and "that action is
//! reflected in `LocalStorage`" (spec.md §3, §4.6, §6.3):
//!
//! * [`client`] — [`client::PublicRest`]/[`client::UserRest`]/[`client::UserStream`],
//!   the venue adapter contract a real venue and [`client::mock::MockExecutionClient`]
//!   both implement.
//! * [`model`] — [`model::Order`], [`model::Position`] and [`model::Account`],
//!   the order/position/account data model (spec.md §3).
//! * [`command`] — [`command::CommandHandler`], the trading state machine
//!   (spec.md §4.6).
//! * [`storage`] — [`storage::LocalStorage`], the per-strategy Position/Order
//!   cache (spec.md §3 "Ownership").
//! * [`listen_key`] — the background listen-key refresh loop (SPEC_FULL
//!   "listen-key refresh loop").
//! * [`error`] — [`error::ExecutionError`].

pub mod client;
pub mod command;
pub mod error;
pub mod listen_key;
pub mod model;
pub mod storage;

pub use error::ExecutionError;
pub use storage::LocalStorage;

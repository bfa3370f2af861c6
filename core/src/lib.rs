// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
//! # Core - Process Wiring for the Kestrel Trading Platform
//!
//! spec.md §2 describes four processes (Feed Publisher, Feed Logger, Strategy
//! Orchestrator, Strategy) sharing a message bus and a document store. Every
//! other crate in the workspace defines a piece those processes need
//! ([`kestrel_data::feed::FeedPublisher`], [`kestrel_trader::Strategy`],
//! [`kestrel_store::Store`]...); this crate is where they're actually
//! instantiated and run.
//!
//! * [`exchange_state`] — [`exchange_state::ExchangeState`], the single owner
//!   of per-symbol `Contract`/`Book`/`Candles`/`Depth` (spec.md §3
//!   "Ownership"), and the concrete [`kestrel_trader::market_view::MarketView`]
//!   implementation strategies read through.
//! * [`system`] — [`system::config::Config`] (spec.md §6.4) and the process
//!   entry points: [`system::feed_publisher`], [`system::feed_logger`],
//!   [`system::orchestrator`], [`system::replay`].
//! * [`logging`] — tracing-subscriber initialisers.
//! * [`shutdown`] — graceful shutdown signal vocabulary.
//! * [`error`] — [`error::KestrelError`], aggregating every subsystem's error
//!   enum.

pub mod error;
pub mod exchange_state;
pub mod logging;
pub mod shutdown;
pub mod system;

pub use error::KestrelError;
pub use exchange_state::ExchangeState;

// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
//! # Data - Market Data Normalization
//!
//! Everything between "raw venue WebSocket frame" and "a [`Candle`] the
//! strategy engine can evaluate an indicator against" (spec.md §4.1-§4.5):
//!
//! * [`event`] — the normalized [`MarketEvent`] envelope and [`DataKind`].
//! * [`feed`] — [`feed::FeedPublisher`], the single-venue-WebSocket
//!   normalizer (spec.md §4.1).
//! * [`bus`] — [`bus::BusConsumer`], the subscriber-side hooks
//!   (`reconnect`/`reset`/`update`) every consumer of the bus implements
//!   (spec.md §4.2).
//! * [`candles`] — the candle ring, [`candles::CandlesAggregator`]
//!   (spec.md §4.3), and the lazy [`candles::IndicatorView`] projection
//!   (spec.md §4.4).
//! * [`depth`] — [`depth::Depth`], order book reconstruction with
//!   sequence-gap detection (spec.md §4.5).
//! * [`books`] — per-symbol [`books::BookCache`] for the latest bid/ask.

pub use event::{DataKind, MarketEvent};

pub mod books;
pub mod bus;
pub mod candles;
pub mod depth;
pub mod event;
pub mod feed;

//! Thin wiring for the Feed Publisher process (spec.md §2, §4.1): construct
//! a [`kestrel_data::feed::FeedPublisher`] over a real venue's
//! [`VenuePublicStream`] and run it forever. The venue wire protocol itself
//! stays out of scope (spec.md §1); callers supply an already-constructed
//! `stream`.

use kestrel_data::books::BookCache;
use kestrel_data::bus::TopicBus;
use kestrel_data::feed::{FeedPublisher, VenuePublicStream};
use kestrel_markets::Symbol;
use std::sync::Arc;

/// Runs the Feed Publisher process: never returns under normal operation.
/// Intended to be spawned as its own task and raced against
/// [`crate::shutdown::wait_for_shutdown_signal`] one level up.
pub async fn run<S: VenuePublicStream>(
    stream: S,
    symbols: Vec<Symbol>,
    bus: Arc<TopicBus>,
    books: Arc<BookCache>,
) -> ! {
    FeedPublisher::new(stream, symbols, bus, books).run().await
}

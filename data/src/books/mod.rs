//! Per-symbol latest bid/ask cache, the `Book` half of `ExchangeState`'s
//! per-symbol ownership (spec.md §3 "Ownership").

use crate::event::BookUpdate;
use kestrel_markets::Symbol;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Thread-safe map of `symbol -> latest BookUpdate`.
///
/// spec.md §5 runs a single cooperative event loop per process, so this
/// would never actually contend; `RwLock` is kept anyway because
/// `ExchangeState` is shared by reference across tasks spawned for
/// bookkeeping (the alive/log tick, the feed-lag watchdog) that read it
/// without blocking the main loop.
#[derive(Debug, Default)]
pub struct BookCache {
    books: RwLock<HashMap<Symbol, BookUpdate>>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the cached book, returning `true` iff `(bid, ask)` actually
    /// changed from the last published pair (spec.md §4.1 "de-duplicated:
    /// only publish when `(bid, ask)` changed").
    pub fn set(&self, symbol: Symbol, update: BookUpdate) -> bool {
        let mut books = self.books.write();
        match books.get(&symbol) {
            Some(existing) if *existing == update => false,
            _ => {
                books.insert(symbol, update);
                true
            }
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<BookUpdate> {
        self.books.read().get(symbol).copied()
    }

    /// Drops every cached book (spec.md §4.1 `reset`: "drop all derived
    /// state, re-snapshot").
    pub fn clear(&self) {
        self.books.write().clear();
    }
}

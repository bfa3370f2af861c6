//! Order book depth reconstruction with sequence-gap detection (spec.md
//! §4.5), grounded on `services/bot/depth/depth.py`.

use crate::event::DepthUpdate;
use kestrel_integration::callback::CallbackRegistry;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::error;

#[derive(Debug, Default)]
struct Side {
    bid: bool,
    levels: BTreeMap<Decimal, Decimal>,
}

impl Side {
    fn new(bid: bool) -> Self {
        Self {
            bid,
            levels: BTreeMap::new(),
        }
    }

    fn clear(&mut self) {
        self.levels.clear();
    }

    fn apply(&mut self, items: &[(Decimal, Decimal)], limit: usize) {
        for &(price, quantity) in items {
            if quantity.is_zero() {
                self.levels.remove(&price);
            } else {
                self.levels.insert(price, quantity);
            }
        }
        self.trim(limit);
    }

    /// Keeps only the `limit` best prices: highest for bids, lowest for asks
    /// (spec.md §4.5 "keep only the `limit` best prices").
    fn trim(&mut self, limit: usize) {
        if self.levels.len() <= limit {
            return;
        }
        if self.bid {
            while self.levels.len() > limit {
                let lowest = *self.levels.keys().next().unwrap();
                self.levels.remove(&lowest);
            }
        } else {
            while self.levels.len() > limit {
                let highest = *self.levels.keys().next_back().unwrap();
                self.levels.remove(&highest);
            }
        }
    }

    /// Best-first iteration: bids highest-first, asks lowest-first.
    fn best_first(&self) -> Vec<(Decimal, Decimal)> {
        if self.bid {
            self.levels.iter().rev().map(|(&p, &q)| (p, q)).collect()
        } else {
            self.levels.iter().map(|(&p, &q)| (p, q)).collect()
        }
    }
}

/// Reconstructed order book depth for one symbol (spec.md §4.5).
pub struct Depth {
    limit: usize,
    bids: Side,
    asks: Side,
    last_update_id: u64,
    is_snapshot_set: bool,
    is_first_update_processed: bool,
    pending: Vec<DepthUpdate>,
    gap_callbacks: CallbackRegistry<()>,
}

impl std::fmt::Debug for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Depth")
            .field("limit", &self.limit)
            .field("last_update_id", &self.last_update_id)
            .field("is_snapshot_set", &self.is_snapshot_set)
            .field("is_first_update_processed", &self.is_first_update_processed)
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// A depth snapshot fetched via REST before streaming diffs begin applying.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthSnapshot {
    pub last_update_id: u64,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

impl Depth {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            bids: Side::new(true),
            asks: Side::new(false),
            last_update_id: 0,
            is_snapshot_set: false,
            is_first_update_processed: false,
            pending: Vec::new(),
            gap_callbacks: CallbackRegistry::new(),
        }
    }

    pub fn add_gap_callback(&mut self, callback: impl Fn(&()) + Send + Sync + 'static) {
        self.gap_callbacks.register(callback);
    }

    pub fn bids(&self) -> Vec<(Decimal, Decimal)> {
        self.bids.best_first()
    }

    pub fn asks(&self) -> Vec<(Decimal, Decimal)> {
        self.asks.best_first()
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.best_first().first().map(|(p, _)| *p)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.best_first().first().map(|(p, _)| *p)
    }

    /// Replaces state with `snapshot`, then drains any updates that arrived
    /// before it (spec.md §4.5 `set_snapshot`).
    pub fn set_snapshot(&mut self, snapshot: DepthSnapshot) {
        self.bids.clear();
        self.asks.clear();
        self.bids.apply(&snapshot.bids, self.limit);
        self.asks.apply(&snapshot.asks, self.limit);
        self.last_update_id = snapshot.last_update_id;
        self.is_snapshot_set = true;

        let pending = std::mem::take(&mut self.pending);
        for update in pending {
            self.update(update);
        }
    }

    /// Feeds one diff batch (spec.md §4.5 `update`).
    pub fn update(&mut self, update: DepthUpdate) {
        if !self.is_snapshot_set {
            self.pending.push(update);
            return;
        }

        if self.is_first_update_processed {
            if update.first_update_id == self.last_update_id + 1 {
                self.apply_diff(&update);
            } else {
                error!(
                    expected = self.last_update_id + 1,
                    got = update.first_update_id,
                    "depth sequence gap, resynchronizing"
                );
                self.reset_for_resync();
                self.gap_callbacks.fire(&());
            }
        } else {
            // Drop updates fully older than the snapshot.
            if update.last_update_id <= self.last_update_id {
                return;
            }
            if update.first_update_id <= self.last_update_id + 1
                && self.last_update_id + 1 <= update.last_update_id
            {
                self.apply_diff(&update);
                self.is_first_update_processed = true;
            }
        }
    }

    fn apply_diff(&mut self, update: &DepthUpdate) {
        self.bids.apply(&update.bids, self.limit);
        self.asks.apply(&update.asks, self.limit);
        self.last_update_id = update.last_update_id;
    }

    fn reset_for_resync(&mut self) {
        self.last_update_id = 0;
        self.is_snapshot_set = false;
        self.is_first_update_processed = false;
        self.bids.clear();
        self.asks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> DepthSnapshot {
        DepthSnapshot {
            last_update_id: 100,
            bids: vec![(dec!(10), dec!(1)), (dec!(9), dec!(2))],
            asks: vec![(dec!(11), dec!(1)), (dec!(12), dec!(2))],
        }
    }

    #[test]
    fn updates_before_snapshot_are_queued_then_drained() {
        let mut depth = Depth::new(10);
        depth.update(DepthUpdate {
            first_update_id: 101,
            last_update_id: 101,
            bids: vec![(dec!(10), dec!(5))],
            asks: vec![],
            timestamp: 0,
        });
        assert!(!depth.is_snapshot_set);

        depth.set_snapshot(snapshot());
        assert_eq!(depth.best_bid(), Some(dec!(10)));
        // Pending update applied as the "first update" after snapshot.
        assert_eq!(depth.bids().first().copied(), Some((dec!(10), dec!(5))));
    }

    #[test]
    fn sequence_gap_triggers_resync_callback() {
        let mut depth = Depth::new(10);
        depth.set_snapshot(snapshot());
        depth.update(DepthUpdate {
            first_update_id: 101,
            last_update_id: 105,
            bids: vec![],
            asks: vec![],
            timestamp: 0,
        });
        assert!(depth.is_first_update_processed);

        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();
        depth.add_gap_callback(move |_| {
            fired_clone.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        // Gap: expected first_update_id 106, got 200.
        depth.update(DepthUpdate {
            first_update_id: 200,
            last_update_id: 210,
            bids: vec![],
            asks: vec![],
            timestamp: 0,
        });

        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!depth.is_snapshot_set);
    }

    #[test]
    fn trim_keeps_best_prices_only() {
        let mut depth = Depth::new(2);
        depth.set_snapshot(DepthSnapshot {
            last_update_id: 1,
            bids: vec![(dec!(10), dec!(1)), (dec!(9), dec!(1)), (dec!(11), dec!(1))],
            asks: vec![],
        });
        assert_eq!(depth.bids(), vec![(dec!(11), dec!(1)), (dec!(10), dec!(1))]);
    }

    #[test]
    fn zero_quantity_removes_price_level() {
        let mut depth = Depth::new(10);
        depth.set_snapshot(snapshot());
        depth.update(DepthUpdate {
            first_update_id: 101,
            last_update_id: 101,
            bids: vec![(dec!(10), Decimal::ZERO)],
            asks: vec![],
            timestamp: 0,
        });
        assert_eq!(depth.bids(), vec![(dec!(9), dec!(2))]);
    }
}

//! Replay mode (spec.md §1 "A replay mode re-plays recorded updates from a
//! document store so the same strategy code can be back-tested", §6.4
//! `replay`/`replay_speed`/`replay_from`/`replay_to`).
//!
//! Grounded on `services/replay/reader.py`: read [`UpdateLogModel`] rows back
//! out in `(symbol, timestamp)` order, re-sorted into a single global
//! timeline, and feed them through the exact same
//! [`kestrel_data::bus::BusConsumer`] hooks — [`Orchestrator::reset`] /
//! [`Orchestrator::update`] — the live bus path drives, so strategy code
//! cannot tell the difference (spec.md §1 "the same strategy code").
//! `replay_speed` paces the feed between "as fast as possible" (`100`) and
//! close to the original wall-clock cadence (`1`); the store's own
//! `Filter` is equality-only (spec.md §6.2), so the `replay_from`/`to` window
//! is applied in memory after the full scan.

use super::update_log::UpdateLogModel;
use crate::system::orchestrator::Orchestrator;
use kestrel_data::bus::BusConsumer;
use kestrel_store::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Paces the gap between two consecutive rows' timestamps down by
/// `replay_speed` (spec.md §6.4 `replay_speed ∈ [0,100]`): `100` sleeps
/// nothing, `0` sleeps the full real-time gap, everything between scales
/// linearly.
fn paced_delay(real_gap_ms: i64, speed: u8) -> Duration {
    if real_gap_ms <= 0 {
        return Duration::ZERO;
    }
    let factor = 100u64.saturating_sub(speed as u64);
    Duration::from_millis((real_gap_ms as u64).saturating_mul(factor) / 100)
}

/// Re-plays every [`UpdateLogModel`] row in `[from, to]` through `orchestrator`
/// in timestamp order, pacing according to `speed`. Fires
/// [`Orchestrator::reset`] once up front, mirroring the live path's "reset
/// before any subsequent update" contract (spec.md §4.1) so derived state
/// starts from a clean slate.
pub async fn run(
    store: Arc<dyn Store<UpdateLogModel>>,
    orchestrator: &mut Orchestrator,
    from: Option<i64>,
    to: Option<i64>,
    speed: u8,
) -> Result<usize, StoreError> {
    let mut rows = store.find(Vec::new()).await?;
    rows.retain(|row| from.map_or(true, |f| row.timestamp >= f) && to.map_or(true, |t| row.timestamp <= t));
    rows.sort_by_key(|row| row.timestamp);

    info!(rows = rows.len(), speed, "replay starting");
    orchestrator.reset().await;

    let mut prev_timestamp: Option<i64> = None;
    for row in &rows {
        if let Some(prev) = prev_timestamp {
            let delay = paced_delay(row.timestamp - prev, speed);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        prev_timestamp = Some(row.timestamp);

        orchestrator.update(&row.entity, &row.symbol, row.payload.clone()).await;
        if orchestrator.shutdown_requested() {
            info!("replay stopped early: feed lag watchdog tripped");
            break;
        }
    }

    info!("replay finished");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange_state::ExchangeState;
    use kestrel_data::books::BookCache;
    use kestrel_data::event::BookUpdate;
    use kestrel_markets::Symbol;
    use kestrel_store::memory::InMemoryStore;
    use kestrel_trader::market_view::MarketView;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn orchestrator(symbol: Symbol) -> Orchestrator {
        let mut contracts = HashMap::new();
        contracts.insert(
            symbol.clone(),
            kestrel_markets::Contract {
                exchange: kestrel_markets::ExchangeId::BinanceTestnet,
                symbol: symbol.clone(),
                base_asset: "BTC".into(),
                quote_asset: "USDT".into(),
                price_decimals: 2,
                quantity_decimals: 3,
                tick_size: dec!(0.01),
                lot_size: dec!(0.001),
                min_notional: dec!(5),
            },
        );
        let state = ExchangeState::new(contracts, vec![kestrel_markets::Timeframe::M1], 100, 100, Arc::new(BookCache::new()));
        Orchestrator::new(state, Vec::new())
    }

    #[test]
    fn pacing_is_instant_at_full_speed_and_full_at_zero() {
        assert_eq!(paced_delay(10_000, 100), Duration::ZERO);
        assert_eq!(paced_delay(10_000, 0), Duration::from_millis(10_000));
        assert_eq!(paced_delay(10_000, 50), Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn replays_rows_in_timestamp_order_regardless_of_storage_order() {
        let symbol = Symbol::new("btcusdt");
        let store: Arc<dyn Store<UpdateLogModel>> = Arc::new(InMemoryStore::new());

        // Insert out of order; replay must still apply the earlier book
        // update first, so the final book reflects the later one.
        store
            .create(&UpdateLogModel::new(symbol.clone(), "book", 2_000, serde_json::to_value(BookUpdate::new(dec!(200), dec!(201))).unwrap()))
            .await
            .unwrap();
        store
            .create(&UpdateLogModel::new(symbol.clone(), "book", 1_000, serde_json::to_value(BookUpdate::new(dec!(100), dec!(101))).unwrap()))
            .await
            .unwrap();

        let mut orch = orchestrator(symbol.clone());
        let replayed = run(store, &mut orch, None, None, 100).await.unwrap();

        assert_eq!(replayed, 2);
        assert_eq!(orch.state.book(&symbol), Some(BookUpdate::new(dec!(200), dec!(201))));
    }

    #[tokio::test]
    async fn from_to_window_excludes_rows_outside_range() {
        let symbol = Symbol::new("btcusdt");
        let store: Arc<dyn Store<UpdateLogModel>> = Arc::new(InMemoryStore::new());
        for (ts, bid) in [(1_000, "100"), (2_000, "200"), (3_000, "300")] {
            store
                .create(&UpdateLogModel::new(
                    symbol.clone(),
                    "book",
                    ts,
                    serde_json::to_value(BookUpdate::new(bid.parse().unwrap(), dec!(1) + bid.parse::<rust_decimal::Decimal>().unwrap())).unwrap(),
                ))
                .await
                .unwrap();
        }

        let mut orch = orchestrator(symbol.clone());
        let replayed = run(store, &mut orch, Some(1_500), Some(2_500), 100).await.unwrap();

        assert_eq!(replayed, 1);
        assert_eq!(orch.state.book(&symbol), Some(BookUpdate::new(dec!(200), dec!(201))));
    }
}

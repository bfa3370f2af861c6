//! Feed Logger process (spec.md §2: "Consumes the same topics, batches
//! updates into a queue, flushes to the document store on a fixed interval
//! for later replay"). Writes [`UpdateLogModel`] rows so [`crate::system::replay`]
//! can re-derive the exact same update sequence.

use super::update_log::UpdateLogModel;
use kestrel_data::bus::{BoundQueue, BusConsumer};
use kestrel_markets::Symbol;
use kestrel_store::Store;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Flush cadence (spec.md §2 "fixed interval").
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

struct BufferingConsumer {
    buffer: Arc<Mutex<Vec<UpdateLogModel>>>,
}

#[async_trait::async_trait]
impl BusConsumer for BufferingConsumer {
    async fn update(&mut self, entity: &str, symbol: &Symbol, data: serde_json::Value) {
        let timestamp = chrono::Utc::now().timestamp_millis();
        self.buffer
            .lock()
            .push(UpdateLogModel::new(symbol.clone(), entity, timestamp, data));
    }
}

async fn flush(store: &Arc<dyn Store<UpdateLogModel>>, buffer: &Arc<Mutex<Vec<UpdateLogModel>>>) {
    let docs = {
        let mut guard = buffer.lock();
        std::mem::take(&mut *guard)
    };
    if docs.is_empty() {
        return;
    }
    if let Err(err) = store.bulk_insert(&docs).await {
        error!(error = %err, rows = docs.len(), "feed logger flush failed");
    } else {
        info!(rows = docs.len(), "feed logger flushed update log rows");
    }
}

/// Runs the Feed Logger process: drains `queue` into an in-memory buffer and
/// flushes it to `store` every [`FLUSH_INTERVAL`], plus once more when the
/// bus closes. Runs until the bus closes (the caller has shut down feed
/// publishing), matching spec.md §2's description of this process's
/// lifetime.
pub async fn run(store: Arc<dyn Store<UpdateLogModel>>, queue: BoundQueue) {
    let buffer: Arc<Mutex<Vec<UpdateLogModel>>> = Arc::new(Mutex::new(Vec::new()));

    let ticker_store = store.clone();
    let ticker_buffer = buffer.clone();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            interval.tick().await;
            flush(&ticker_store, &ticker_buffer).await;
        }
    });

    let mut consumer = BufferingConsumer { buffer: buffer.clone() };
    queue.run(&mut consumer).await;

    ticker.abort();
    flush(&store, &buffer).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_data::bus::{BusMessage, TopicBus};
    use kestrel_store::memory::InMemoryStore;

    #[tokio::test]
    async fn buffered_updates_flush_to_store() {
        let bus = TopicBus::new(16);
        let queue = bus.subscribe(vec!["#".into()]);
        let store: Arc<dyn Store<UpdateLogModel>> = Arc::new(InMemoryStore::new());

        bus.publish(BusMessage::update(&Symbol::new("btcusdt"), "trade", serde_json::json!({"price": "1"})));
        drop(bus);

        run(store.clone(), queue).await;

        let rows = store.find(Vec::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity, "trade");
    }
}

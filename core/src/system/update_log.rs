//! `UpdateLogModel`: the write-once record of every bus update, persisted so
//! a replay run can re-derive the exact same sequence (spec.md §3 "UpdateLog
//! (for replay)", §6.2 index `(symbol ASC, timestamp ASC)`).

use kestrel_markets::Symbol;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateLogModel {
    pub symbol: Symbol,
    pub entity: String,
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

impl UpdateLogModel {
    pub fn new(symbol: Symbol, entity: &str, timestamp: i64, payload: serde_json::Value) -> Self {
        Self {
            symbol,
            entity: entity.to_string(),
            timestamp,
            payload,
        }
    }
}

impl kestrel_store::Document for UpdateLogModel {
    /// Identity is implicit (spec.md §3): no id is ever looked up by itself,
    /// only scanned in `(symbol, timestamp)` order, so the backing store's
    /// own generated `_id` suffices and this type never reads it back.
    type Id = ();

    const COLLECTION: &'static str = "update_log";
    const INDEXES: &'static [kestrel_store::IndexSpec] = &[&["symbol", "timestamp"]];

    fn id(&self) -> Self::Id {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_and_index_match_spec() {
        assert_eq!(UpdateLogModel::COLLECTION, "update_log");
        assert_eq!(UpdateLogModel::INDEXES, &[&["symbol", "timestamp"]]);
    }
}

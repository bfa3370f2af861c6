use serde::{de::DeserializeOwned, Serialize};

/// A field list making up one secondary index, e.g. `&["symbol", "timestamp"]`
/// for the `UpdateLogModel` index spec.md §6.2 names as `(symbol ASC,
/// timestamp ASC)`. Order in the slice is the index's column order.
pub type IndexSpec = &'static [&'static str];

/// A record persisted in the document store.
///
/// Implementors name their MongoDB collection and identity field, and list
/// the secondary indexes spec.md §6.2 requires for that collection so a real
/// backing store's index-creation step stays mechanical.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// The type of this document's primary key.
    type Id: Serialize + Send + Sync + Clone;

    /// Collection name in the backing store.
    const COLLECTION: &'static str;

    /// Secondary indexes required on this collection, beyond the implicit
    /// unique index on the primary key.
    const INDEXES: &'static [IndexSpec];

    fn id(&self) -> Self::Id;
}

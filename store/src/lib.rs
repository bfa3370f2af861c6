// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
//! # Store - Durable Document Store Abstraction
//!
//! spec.md §6.2 treats the document store as an external collaborator and
//! specifies only its contract: typed CRUD plus a handful of secondary
//! indexes per collection. This crate models that contract as the
//! [`Store`] trait, ships an [`memory::InMemoryStore`] test double used
//! throughout the rest of the workspace's test suites, and a
//! [`mongo::MongoStore`] backed by the real `mongodb` driver with the
//! "Mongo proxy" transient-error retry behaviour spec.md §9 describes.

pub mod document;
pub mod error;
pub mod memory;
pub mod mongo;
pub mod retry;

pub use document::{Document, IndexSpec};
pub use error::StoreError;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// A field/value equality filter, ANDed together. This system never needs
/// anything richer than equality + a handful of range-order guarantees
/// (already encoded as index declarations, see [`IndexSpec`]), so no query
/// builder DSL is introduced.
pub type Filter = Vec<(&'static str, bson::Bson)>;

/// Generic document store contract (spec.md §6.2 "Operations required").
#[async_trait]
pub trait Store<D: Document>: Send + Sync {
    async fn get(&self, id: &D::Id) -> Result<Option<D>, StoreError>;

    async fn find(&self, filter: Filter) -> Result<Vec<D>, StoreError>;

    /// Streaming cursor variant of [`Store::find`], for result sets too large
    /// to buffer (spec.md §6.2 `find_iter`).
    async fn find_iter(&self, filter: Filter) -> Result<BoxStream<'static, D>, StoreError>;

    async fn count(&self, filter: Filter) -> Result<u64, StoreError>;

    async fn create(&self, doc: &D) -> Result<(), StoreError>;

    /// Replaces the document matching `filter` with `doc` in full.
    async fn update(&self, filter: Filter, doc: &D) -> Result<(), StoreError>;

    /// Applies `patch` (field -> new value) to the document matching
    /// `filter` and returns the document as it is after the update.
    async fn partial_update(
        &self,
        filter: Filter,
        patch: Vec<(&'static str, bson::Bson)>,
    ) -> Result<Option<D>, StoreError>;

    async fn upsert(&self, filter: Filter, doc: &D) -> Result<(), StoreError>;

    async fn delete(&self, filter: Filter) -> Result<u64, StoreError>;

    /// Bulk single-kind insert (spec.md §6.2 `bulk_write` with `InsertOne`).
    async fn bulk_insert(&self, docs: &[D]) -> Result<(), StoreError>;
}

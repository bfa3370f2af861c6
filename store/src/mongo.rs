//! Real document store backed by the `mongodb` driver.
//!
//! Every operation goes through [`retry::with_retry`] so a transient
//! `NotMaster`/timeout during a replica-set election looks, to the caller,
//! like nothing happened (spec.md §9 "Mongo proxy").

use crate::retry::with_retry;
use crate::{Document, Filter, Store, StoreError};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::{doc, Document as BsonDocument};
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{Collection, Database, IndexModel};

#[derive(Debug, Clone)]
pub struct MongoStore<D: Document> {
    collection: Collection<D>,
}

impl<D: Document> MongoStore<D> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(D::COLLECTION),
        }
    }

    /// Creates every index `D::INDEXES` declares, idempotently. Intended to
    /// run once at startup (spec.md §6.2 "declared per collection, created at
    /// startup").
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for fields in D::INDEXES {
            let keys = fields
                .iter()
                .fold(BsonDocument::new(), |mut acc, field| {
                    acc.insert(*field, 1);
                    acc
                });
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().build())
                .build();
            with_retry("ensure_index", || async {
                self.collection
                    .create_index(model.clone())
                    .await
                    .map(|_| ())
                    .map_err(transport_err)
            })
            .await?;
        }
        Ok(())
    }

    fn bson_filter(filter: &Filter) -> BsonDocument {
        filter
            .iter()
            .fold(BsonDocument::new(), |mut acc, (field, value)| {
                acc.insert(*field, value.clone());
                acc
            })
    }
}

fn transport_err(err: mongodb::error::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

#[async_trait]
impl<D: Document> Store<D> for MongoStore<D> {
    async fn get(&self, id: &D::Id) -> Result<Option<D>, StoreError> {
        let id_bson =
            mongodb::bson::to_bson(id).map_err(|e| StoreError::Serialization(e.to_string()))?;
        with_retry("get", || async {
            self.collection
                .find_one(doc! { "_id": id_bson.clone() })
                .await
                .map_err(transport_err)
        })
        .await
    }

    async fn find(&self, filter: Filter) -> Result<Vec<D>, StoreError> {
        let query = Self::bson_filter(&filter);
        with_retry("find", || async {
            let cursor = self.collection.find(query.clone()).await.map_err(transport_err)?;
            cursor
                .try_collect()
                .await
                .map_err(transport_err)
        })
        .await
    }

    async fn find_iter(&self, filter: Filter) -> Result<BoxStream<'static, D>, StoreError> {
        let query = Self::bson_filter(&filter);
        let cursor = with_retry("find_iter", || async {
            self.collection.find(query.clone()).await.map_err(transport_err)
        })
        .await?;
        Ok(cursor.filter_map(|item| async { item.ok() }).boxed())
    }

    async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
        let query = Self::bson_filter(&filter);
        with_retry("count", || async {
            self.collection
                .count_documents(query.clone())
                .await
                .map_err(transport_err)
        })
        .await
    }

    async fn create(&self, doc: &D) -> Result<(), StoreError> {
        with_retry("create", || async {
            self.collection
                .insert_one(doc)
                .await
                .map(|_| ())
                .map_err(transport_err)
        })
        .await
    }

    async fn update(&self, filter: Filter, doc: &D) -> Result<(), StoreError> {
        let query = Self::bson_filter(&filter);
        with_retry("update", || async {
            self.collection
                .replace_one(query.clone(), doc)
                .await
                .map(|_| ())
                .map_err(transport_err)
        })
        .await
    }

    async fn partial_update(
        &self,
        filter: Filter,
        patch: Vec<(&'static str, mongodb::bson::Bson)>,
    ) -> Result<Option<D>, StoreError> {
        let query = Self::bson_filter(&filter);
        let set_doc = patch
            .into_iter()
            .fold(BsonDocument::new(), |mut acc, (field, value)| {
                acc.insert(field, value);
                acc
            });
        with_retry("partial_update", || async {
            self.collection
                .find_one_and_update(query.clone(), doc! { "$set": set_doc.clone() })
                .await
                .map_err(transport_err)
        })
        .await
    }

    async fn upsert(&self, filter: Filter, doc: &D) -> Result<(), StoreError> {
        let query = Self::bson_filter(&filter);
        with_retry("upsert", || async {
            self.collection
                .replace_one(query.clone(), doc)
                .with_options(ReplaceOptions::builder().upsert(true).build())
                .await
                .map(|_| ())
                .map_err(transport_err)
        })
        .await
    }

    async fn delete(&self, filter: Filter) -> Result<u64, StoreError> {
        let query = Self::bson_filter(&filter);
        with_retry("delete", || async {
            self.collection
                .delete_many(query.clone())
                .await
                .map(|result| result.deleted_count)
                .map_err(transport_err)
        })
        .await
    }

    async fn bulk_insert(&self, docs: &[D]) -> Result<(), StoreError> {
        if docs.is_empty() {
            return Ok(());
        }
        with_retry("bulk_insert", || async {
            self.collection
                .insert_many(docs)
                .await
                .map(|_| ())
                .map_err(transport_err)
        })
        .await
    }
}

//! In-memory [`Store`] double used by every crate's test suite, and by
//! [`kestrel_execution`](../../execution)'s mock exchange client so tests
//! never need a live MongoDB.

use crate::{Document, Filter, Store, StoreError};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use std::marker::PhantomData;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct InMemoryStore<D: Document> {
    rows: RwLock<Vec<D>>,
    _marker: PhantomData<D>,
}

impl<D: Document> Default for InMemoryStore<D> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            _marker: PhantomData,
        }
    }
}

impl<D: Document> InMemoryStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(doc: &D, filter: &Filter) -> bool {
        if filter.is_empty() {
            return true;
        }
        let Ok(bson::Bson::Document(encoded)) = bson::to_bson(doc) else {
            return false;
        };
        filter
            .iter()
            .all(|(field, expected)| encoded.get(*field) == Some(expected))
    }
}

#[async_trait]
impl<D: Document> Store<D> for InMemoryStore<D>
where
    D::Id: PartialEq + Send + Sync,
{
    async fn get(&self, id: &D::Id) -> Result<Option<D>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|d| &d.id() == id).cloned())
    }

    async fn find(&self, filter: Filter) -> Result<Vec<D>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|d| Self::matches(d, &filter))
            .cloned()
            .collect())
    }

    async fn find_iter(&self, filter: Filter) -> Result<BoxStream<'static, D>, StoreError> {
        let matched = self.find(filter).await?;
        Ok(Box::pin(stream::iter(matched)))
    }

    async fn count(&self, filter: Filter) -> Result<u64, StoreError> {
        Ok(self.find(filter).await?.len() as u64)
    }

    async fn create(&self, doc: &D) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.push(doc.clone());
        Ok(())
    }

    async fn update(&self, filter: Filter, doc: &D) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let Some(slot) = rows.iter_mut().find(|d| Self::matches(d, &filter)) else {
            return Err(StoreError::NotFound);
        };
        *slot = doc.clone();
        Ok(())
    }

    async fn partial_update(
        &self,
        filter: Filter,
        patch: Vec<(&'static str, bson::Bson)>,
    ) -> Result<Option<D>, StoreError> {
        let mut rows = self.rows.write().await;
        let Some(slot) = rows.iter_mut().find(|d| Self::matches(d, &filter)) else {
            return Ok(None);
        };
        let Ok(bson::Bson::Document(mut encoded)) = bson::to_bson(&*slot) else {
            return Err(StoreError::Serialization("encode failed".into()));
        };
        for (field, value) in patch {
            encoded.insert(field, value);
        }
        let patched: D = bson::from_bson(bson::Bson::Document(encoded))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        *slot = patched.clone();
        Ok(Some(patched))
    }

    async fn upsert(&self, filter: Filter, doc: &D) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(slot) = rows.iter_mut().find(|d| Self::matches(d, &filter)) {
            *slot = doc.clone();
        } else {
            rows.push(doc.clone());
        }
        Ok(())
    }

    async fn delete(&self, filter: Filter) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|d| !Self::matches(d, &filter));
        Ok((before - rows.len()) as u64)
    }

    async fn bulk_insert(&self, docs: &[D]) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.extend_from_slice(docs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: u32,
        label: String,
    }

    impl Document for Widget {
        type Id = u32;
        const COLLECTION: &'static str = "widgets";
        const INDEXES: &'static [crate::IndexSpec] = &[];

        fn id(&self) -> Self::Id {
            self.id
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryStore::<Widget>::new();
        let widget = Widget {
            id: 1,
            label: "a".into(),
        };
        store.create(&widget).await.unwrap();

        let fetched = store.get(&1).await.unwrap();
        assert_eq!(fetched, Some(widget));
    }

    #[tokio::test]
    async fn partial_update_patches_single_field() {
        let store = InMemoryStore::<Widget>::new();
        store
            .create(&Widget {
                id: 1,
                label: "a".into(),
            })
            .await
            .unwrap();

        let patched = store
            .partial_update(
                vec![("id", bson::Bson::Int32(1))],
                vec![("label", bson::Bson::String("b".into()))],
            )
            .await
            .unwrap();

        assert_eq!(
            patched,
            Some(Widget {
                id: 1,
                label: "b".into()
            })
        );
    }

    #[tokio::test]
    async fn delete_removes_matching_rows() {
        let store = InMemoryStore::<Widget>::new();
        store
            .create(&Widget {
                id: 1,
                label: "a".into(),
            })
            .await
            .unwrap();

        let deleted = store
            .delete(vec![("id", bson::Bson::Int32(1))])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count(vec![]).await.unwrap(), 0);
    }
}

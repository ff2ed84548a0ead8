//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that keeps each collection as an
//! insertion-ordered list of BSON documents behind an async-safe read-write lock.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mea::rwlock::RwLock;
use bson::{Bson, Document};

use docmodel_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    document::{ID_KEY, new_identity},
    error::DocumentStoreResult,
    query::FindOptions,
};

use crate::evaluator::{DocumentEvaluator, apply_modifier, same_identity, sort_documents};

type CollectionList = Vec<Document>;
type StoreMap = HashMap<String, CollectionList>;


/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
/// Specs and modifiers are interpreted by the [`evaluator`](crate::evaluator) module.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Every operation scans the collection (no indexing). This is meant for development,
/// tests and small data sets.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.save("users", doc! { "name": "Alice", "age": 30 }).await?;
///     let alice = store.find_one("users", doc! { "_id": id }).await?;
///     assert!(alice.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    ///
    /// The returned store is ready for use and contains no collections or documents.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmodel_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, collection: &str, spec: Document, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut matched = DocumentEvaluator::filter_documents(documents, &spec)?;

        sort_documents(&mut matched, &options.sort);

        Ok(
            matched
                .into_iter()
                .skip(options.skip.unwrap_or(0))
                .take(options.effective_limit().unwrap_or(usize::MAX))
                .collect()
        )
    }

    /// Streams a snapshot of the matching window taken when the stream is opened.
    async fn stream(&self, collection: &str, spec: Document, options: FindOptions, _batch_size: usize) -> DocumentStoreResult<DocumentStream> {
        let documents = self.find(collection, spec, options).await?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(None),
        };

        for document in documents {
            if DocumentEvaluator::new(document).matches(&spec)? {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let mut count = 0;

        for document in documents {
            if DocumentEvaluator::new(document).matches(&spec)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn save(&self, collection: &str, mut document: Document) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_KEY).cloned() {
            None | Some(Bson::Null) => {
                let id = new_identity();
                let mut identified = Document::new();

                identified.insert(ID_KEY, id.clone());

                for (key, value) in document {
                    if key != ID_KEY {
                        identified.insert(key, value);
                    }
                }

                document = identified;

                id
            }
            Some(id) => id,
        };

        let mut store = self.store.write().await;

        if !store.contains_key(collection) {
            log::trace!("creating in-memory collection {}", collection);
        }

        let documents = store
            .entry(collection.to_string())
            .or_default();

        let existing = documents
            .iter_mut()
            .find(|stored| stored.get(ID_KEY).is_some_and(|stored_id| same_identity(stored_id, &id)));

        match existing {
            Some(stored) => *stored = document,
            None => documents.push(document),
        }

        Ok(id)
    }

    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let mut doomed = Vec::with_capacity(documents.len());

        for document in documents.iter() {
            doomed.push(DocumentEvaluator::new(document).matches(&spec)?);
        }

        let removed = doomed.iter().filter(|doomed| **doomed).count();
        let mut doomed = doomed.into_iter();

        documents.retain(|_| !doomed.next().unwrap_or(false));

        Ok(removed as u64)
    }

    async fn update(&self, collection: &str, spec: Document, modifier: Document, multi: bool) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let mut matched = Vec::new();

        for (index, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(&spec)? {
                matched.push(index);

                if !multi {
                    break;
                }
            }
        }

        // a failing modifier leaves the collection untouched
        let mut updated = Vec::with_capacity(matched.len());

        for index in &matched {
            let mut document = documents[*index].clone();
            apply_modifier(&mut document, &modifier)?;
            updated.push(document);
        }

        for (index, document) in matched.iter().zip(updated) {
            documents[*index] = document;
        }

        Ok(matched.len() as u64)
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(name);

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();

        Ok(names)
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// Currently a no-op builder; it exists so the in-memory backend can be passed to
/// `DocumentStore::connect` like any other backend.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

impl InMemoryStoreBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::SortDirection;

    #[tokio::test]
    async fn save_assigns_identity_and_replaces() {
        let store = InMemoryStore::new();

        let id = store.save("people", doc! { "name": "alice" }).await.unwrap();
        let stored = store.find_one("people", doc! { "_id": id.clone() }).await.unwrap().unwrap();

        assert_eq!(stored.keys().next().map(String::as_str), Some(ID_KEY));
        assert_eq!(stored.get_str("name").unwrap(), "alice");

        let again = store
            .save("people", doc! { "_id": id.clone(), "name": "alicia" })
            .await
            .unwrap();

        assert_eq!(again, id);
        assert_eq!(store.count("people", doc! {}).await.unwrap(), 1);
        assert_eq!(
            store.find_one("people", doc! {}).await.unwrap().unwrap().get_str("name").unwrap(),
            "alicia"
        );
    }

    #[tokio::test]
    async fn find_filters_sorts_and_pages() {
        let store = InMemoryStore::new();

        for n in [3, 1, 4, 1, 5] {
            store.save("numbers", doc! { "n": n }).await.unwrap();
        }

        let options = FindOptions::builder()
            .sort("n", SortDirection::Desc)
            .skip(1)
            .limit(2)
            .build();
        let found = store
            .find("numbers", doc! { "n": { "$gt": 1 } }, options)
            .await
            .unwrap();

        let values = found.iter().map(|d| d.get_i32("n").unwrap()).collect::<Vec<_>>();
        assert_eq!(values, vec![4, 3]);

        // a zero limit is no limit
        let all = store
            .find("numbers", doc! {}, FindOptions::builder().limit(0).build())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn stream_is_unaffected_by_later_removals() {
        let store = InMemoryStore::new();

        for n in 1..=4 {
            store.save("numbers", doc! { "n": n }).await.unwrap();
        }

        let options = FindOptions::builder().sort("n", SortDirection::Asc).build();
        let mut documents = store.stream("numbers", doc! {}, options, 1).await.unwrap();

        let mut seen = Vec::new();

        while let Some(document) = documents.next().await {
            let document = document.unwrap();
            store.remove("numbers", doc! { "_id": document.get(ID_KEY).unwrap().clone() }).await.unwrap();
            seen.push(document.get_i32("n").unwrap());
        }

        assert_eq!(seen, vec![1, 2, 3, 4]);
        assert_eq!(store.count("numbers", doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_single_and_multi() {
        let store = InMemoryStore::new();

        for _ in 0..3 {
            store.save("things", doc! { "flag": false }).await.unwrap();
        }

        let one = store
            .update("things", doc! { "flag": false }, doc! { "$set": { "flag": true } }, false)
            .await
            .unwrap();
        assert_eq!(one, 1);

        let rest = store
            .update("things", doc! { "flag": false }, doc! { "$set": { "flag": true } }, true)
            .await
            .unwrap();
        assert_eq!(rest, 2);
        assert_eq!(store.count("things", doc! { "flag": true }).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn remove_and_drop() {
        let store = InMemoryStore::new();

        store.save("a", doc! { "x": 1 }).await.unwrap();
        store.save("a", doc! { "x": 2 }).await.unwrap();
        store.save("b", doc! { "x": 1 }).await.unwrap();

        assert_eq!(store.remove("a", doc! { "x": 1 }).await.unwrap(), 1);
        assert_eq!(store.count("a", doc! {}).await.unwrap(), 1);
        assert_eq!(store.list_collections().await.unwrap(), vec!["a", "b"]);

        store.drop_collection("a").await.unwrap();
        store.drop_collection("missing").await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["b"]);
        assert_eq!(store.count("a", doc! {}).await.unwrap(), 0);
    }
}

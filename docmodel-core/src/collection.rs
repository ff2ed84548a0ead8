//! Collection handles for document store operations.
//!
//! A [`Collection`] binds a collection name to the store's backend and forwards raw
//! document operations to it. Models go through a collection for every round-trip, which
//! is where those round-trips are logged.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! # async fn example(store: &docmodel::store::DocumentStore) -> docmodel::error::DocumentStoreResult<()> {
//! let people = store.collection("person");
//! let id = people.save(doc! { "name": "Alice" }).await?;
//! let alice = people.find_one(doc! { "_id": id }).await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Document};

use crate::{
    backend::{DocumentStream, DynStoreBackend},
    error::DocumentStoreResult,
    query::FindOptions,
};

/// An untyped collection with a reference to a storage backend.
///
/// Documents are raw BSON; schema enforcement happens in the model layer above.
#[derive(Debug, Clone, Copy)]
pub struct Collection<'a> {
    name: &'a str,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(name: &'a str, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the documents matching `spec`, ordered and paged by `options`.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn find(&self, spec: Document, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        log::debug!("find on {}: spec={} options={:?}", self.name, spec, options);

        self.backend
            .find(self.name, spec, options)
            .await
    }

    /// Opens a single result stream over the documents matching `spec`.
    pub async fn stream(
        &self,
        spec: Document,
        options: FindOptions,
        batch_size: usize,
    ) -> DocumentStoreResult<DocumentStream> {
        log::debug!("stream on {}: spec={} options={:?}", self.name, spec, options);

        self.backend
            .stream(self.name, spec, options, batch_size)
            .await
    }

    /// Returns the first document matching `spec`.
    pub async fn find_one(&self, spec: Document) -> DocumentStoreResult<Option<Document>> {
        log::debug!("find_one on {}: spec={}", self.name, spec);

        self.backend.find_one(self.name, spec).await
    }

    /// Counts the documents matching `spec`.
    pub async fn count(&self, spec: Document) -> DocumentStoreResult<u64> {
        log::debug!("count on {}: spec={}", self.name, spec);

        self.backend.count(self.name, spec).await
    }

    /// Inserts or replaces `document`, returning the identity it was stored under.
    pub async fn save(&self, document: Document) -> DocumentStoreResult<Bson> {
        log::debug!("save on {}: {}", self.name, document);

        self.backend.save(self.name, document).await
    }

    /// Removes every document matching `spec`.
    pub async fn remove(&self, spec: Document) -> DocumentStoreResult<u64> {
        log::debug!("remove on {}: spec={}", self.name, spec);

        self.backend.remove(self.name, spec).await
    }

    /// Applies `modifier` to the first (or, with `multi`, every) document matching `spec`.
    pub async fn update(&self, spec: Document, modifier: Document, multi: bool) -> DocumentStoreResult<u64> {
        log::debug!(
            "update on {}: spec={} modifier={} multi={}",
            self.name,
            spec,
            modifier,
            multi
        );

        self.backend
            .update(self.name, spec, modifier, multi)
            .await
    }

    /// Drops the collection and every document in it.
    pub async fn drop(&self) -> DocumentStoreResult<()> {
        log::debug!("drop collection {}", self.name);

        self.backend.drop_collection(self.name).await
    }
}

//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over storage implementations, so models
//! and cursors work the same against an in-memory store and a MongoDB deployment.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for the operations the
//! model layer needs: spec-based finds and counts, saves keyed by identity, spec-based
//! removal and modifier updates, and collection management. Specs and modifiers are plain
//! [`bson::Document`]s in the store-native query language and are passed through unchanged.
//! Implementations are required to be thread-safe (`Send + Sync`).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.save("users", doc! { "name": "Alice", "age": 30 }).await?;
//! let found = backend.find_one("users", doc! { "_id": id }).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::{any::Any, fmt::Debug};

use crate::{error::DocumentStoreResult, query::FindOptions};

/// A single result stream of a find, pulled forward by a cursor.
///
/// The stream owns its state: it does not borrow the backend, and documents written to the
/// collection after it was opened do not shift its position.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<Document>>;

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The concurrency model is implementation-specific.
///
/// # Specs and modifiers
///
/// A spec is a filter document (`{"name": "x", "age": {"$gt": 3}}`); the empty document
/// matches everything. A modifier is either an operator document (`{"$set": {...}}`) or a
/// replacement document. Backends interpret both in their native query language.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents of `collection` matching `spec`, ordered and paged by `options`.
    ///
    /// A missing collection yields no documents.
    async fn find(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Opens one result stream over the documents of `collection` matching `spec`.
    ///
    /// `batch_size` is a hint for how many documents the backend fetches per round-trip.
    async fn stream(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
        batch_size: usize,
    ) -> DocumentStoreResult<DocumentStream>;

    /// Returns the first document of `collection` matching `spec`, if any.
    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>>;

    /// Counts the documents of `collection` matching `spec`.
    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64>;

    /// Inserts or replaces `document` in `collection`, keyed by its `_id`.
    ///
    /// A document without an identity is assigned a fresh one. The collection is created
    /// on first write.
    ///
    /// # Returns
    ///
    /// Returns the identity the document was stored under.
    async fn save(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson>;

    /// Removes every document of `collection` matching `spec` and returns how many were removed.
    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64>;

    /// Applies `modifier` to the first (or, with `multi`, every) document matching `spec`.
    ///
    /// # Returns
    ///
    /// Returns the number of documents modified.
    async fn update(
        &self,
        collection: &str,
        spec: Document,
        modifier: Document,
        multi: bool,
    ) -> DocumentStoreResult<u64>;

    /// Drops (deletes) a collection and all its documents.
    ///
    /// Dropping a collection that does not exist is not an error.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .find(collection, spec, options)
            .await
    }

    async fn stream(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
        batch_size: usize,
    ) -> DocumentStoreResult<DocumentStream> {
        (*self)
            .stream(collection, spec, options, batch_size)
            .await
    }

    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>> {
        (*self).find_one(collection, spec).await
    }

    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        (*self).count(collection, spec).await
    }

    async fn save(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        (*self).save(collection, document).await
    }

    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        (*self).remove(collection, spec).await
    }

    async fn update(
        &self,
        collection: &str,
        spec: Document,
        modifier: Document,
        multi: bool,
    ) -> DocumentStoreResult<u64> {
        (*self)
            .update(collection, spec, modifier, multi)
            .await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }
}

#[async_trait]
impl<B> StoreBackend for &mut B
where
    B: StoreBackend,
{
    async fn find(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self)
            .find(collection, spec, options)
            .await
    }

    async fn stream(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
        batch_size: usize,
    ) -> DocumentStoreResult<DocumentStream> {
        (**self)
            .stream(collection, spec, options, batch_size)
            .await
    }

    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>> {
        (**self).find_one(collection, spec).await
    }

    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        (**self).count(collection, spec).await
    }

    async fn save(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        (**self).save(collection, document).await
    }

    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        (**self).remove(collection, spec).await
    }

    async fn update(
        &self,
        collection: &str,
        spec: Document,
        modifier: Document,
        multi: bool,
    ) -> DocumentStoreResult<u64> {
        (**self)
            .update(collection, spec, modifier, multi)
            .await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).drop_collection(name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (**self).list_collections().await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn find(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn stream(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
        batch_size: usize,
    ) -> DocumentStoreResult<DocumentStream>;
    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>>;
    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64>;
    async fn save(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson>;
    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64>;
    async fn update(
        &self,
        collection: &str,
        spec: Document,
        modifier: Document,
        multi: bool,
    ) -> DocumentStoreResult<u64>;
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn find(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find(self, collection, spec, options).await
    }

    async fn stream(
        &self,
        collection: &str,
        spec: Document,
        options: FindOptions,
        batch_size: usize,
    ) -> DocumentStoreResult<DocumentStream> {
        StoreBackend::stream(self, collection, spec, options, batch_size).await
    }

    async fn find_one(&self, collection: &str, spec: Document) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(self, collection, spec).await
    }

    async fn count(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        StoreBackend::count(self, collection, spec).await
    }

    async fn save(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        StoreBackend::save(self, collection, document).await
    }

    async fn remove(&self, collection: &str, spec: Document) -> DocumentStoreResult<u64> {
        StoreBackend::remove(self, collection, spec).await
    }

    async fn update(
        &self,
        collection: &str,
        spec: Document,
        modifier: Document,
        multi: bool,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::update(self, collection, spec, modifier, multi).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        self.shutdown().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

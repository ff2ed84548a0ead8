//! Lazy, forward-only cursors over find results.
//!
//! A [`Cursor`] holds the originating spec, the ordering and the paging window. Nothing
//! is fetched until the first [`Cursor::next`] call, which opens a single result stream on
//! the backend (batched by [`StoreOptions::batch_size`](crate::store::StoreOptions)). The
//! cursor then only moves forward along that stream, so writes made while iterating, such
//! as deleting each yielded document, neither skip nor repeat results. Each document is
//! decoded into the owning kind, or the polymorphic variant it resolves to.
//!
//! ```ignore
//! use futures::TryStreamExt;
//!
//! let oldest = person
//!     .find(&store, doc! { "age": { "$gt": 3 } })
//!     .sort("age", SortDirection::Desc)?
//!     .limit(10)?
//!     .into_stream()
//!     .try_collect::<Vec<_>>()
//!     .await?;
//! ```

use bson::{Document, doc};
use futures::stream::{self, Stream, StreamExt};
use std::{fmt, sync::Arc};

use crate::{
    backend::DocumentStream,
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    query::{FindOptions, Sort, SortDirection},
    schema::ModelKind,
    store::DocumentStore,
};

/// A lazy cursor over the documents matching a spec.
pub struct Cursor<'a> {
    kind: Arc<ModelKind>,
    store: &'a DocumentStore,
    spec: Option<Document>,
    order: Vec<Sort>,
    limit: Option<usize>,
    skip: Option<usize>,
    stream: Option<DocumentStream>,
    started: bool,
    exhausted: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(kind: Arc<ModelKind>, store: &'a DocumentStore, spec: Option<Document>) -> Self {
        Self {
            kind,
            store,
            spec,
            order: Vec::new(),
            limit: None,
            skip: None,
            stream: None,
            started: false,
            exhausted: false,
        }
    }

    /// Returns the kind documents are decoded into.
    pub fn kind(&self) -> &Arc<ModelKind> {
        &self.kind
    }

    /// Returns the originating spec.
    pub fn spec(&self) -> Option<&Document> {
        self.spec.as_ref()
    }

    /// Returns the accumulated ordering, most significant first.
    pub fn ordering(&self) -> &[Sort] {
        &self.order
    }

    fn collection(&self) -> Collection<'_> {
        self.store.collection(self.kind.collection_name())
    }

    fn ensure_pending(&self, operation: &str) -> DocumentStoreResult<()> {
        if self.started {
            return Err(DocumentStoreError::InvalidOperation(format!(
                "cannot change {operation} of a cursor after iteration has started"
            )));
        }

        Ok(())
    }

    /// Appends ordering entries.
    ///
    /// Orderings accumulate: each call extends the entries given so far and the whole
    /// list is applied, earlier entries taking precedence.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] if `pairs` is empty and
    /// [`DocumentStoreError::InvalidOperation`] once iteration has started.
    pub fn order<I, K>(mut self, pairs: I) -> DocumentStoreResult<Self>
    where
        I: IntoIterator<Item = (K, SortDirection)>,
        K: Into<String>,
    {
        self.ensure_pending("the ordering")?;

        let entries = pairs
            .into_iter()
            .map(|(field, direction)| Sort::new(field, direction))
            .collect::<Vec<_>>();

        if entries.is_empty() {
            return Err(DocumentStoreError::InvalidArgument(
                "order requires at least one (field, direction) pair".to_string(),
            ));
        }

        self.order.extend(entries);

        Ok(self)
    }

    /// Replaces the whole ordering with `sort`, discarding entries accumulated so far.
    ///
    /// An empty list removes the ordering.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidOperation`] once iteration has started.
    pub fn raw_sort(mut self, sort: Vec<Sort>) -> DocumentStoreResult<Self> {
        self.ensure_pending("the ordering")?;
        self.order = sort;

        Ok(self)
    }

    /// Appends a single ordering entry. See [`order`](Self::order).
    pub fn sort(self, field: impl Into<String>, direction: SortDirection) -> DocumentStoreResult<Self> {
        self.order([(field.into(), direction)])
    }

    /// Caps the number of documents the cursor yields. A limit of zero means no limit.
    pub fn limit(mut self, limit: usize) -> DocumentStoreResult<Self> {
        self.ensure_pending("the limit")?;
        self.limit = Some(limit);

        Ok(self)
    }

    /// Skips the first `skip` matching documents.
    pub fn skip(mut self, skip: usize) -> DocumentStoreResult<Self> {
        self.ensure_pending("the skip")?;
        self.skip = Some(skip);

        Ok(self)
    }

    fn spec_or_all(&self) -> Document {
        self.spec.clone().unwrap_or_default()
    }

    /// Finds the document at `index` within the cursor's window, in one round-trip.
    async fn fetch_at(&self, index: usize) -> DocumentStoreResult<Option<Model>> {
        let window = FindOptions {
            sort: self.order.clone(),
            limit: self.limit,
            skip: self.skip,
        };

        if window.effective_limit().is_some_and(|limit| index >= limit) {
            return Ok(None);
        }

        let options = FindOptions {
            limit: Some(1),
            skip: Some(self.skip.unwrap_or(0).saturating_add(index)),
            ..window
        };

        self.collection()
            .find(self.spec_or_all(), options)
            .await?
            .into_iter()
            .next()
            .map(|document| self.kind.decode(document))
            .transpose()
    }

    /// Returns the first document of the window, without advancing the cursor.
    pub async fn first(&self) -> DocumentStoreResult<Option<Model>> {
        self.fetch_at(0).await
    }

    /// Returns the document at `index` of the window, without advancing the cursor.
    pub async fn get(&self, index: usize) -> DocumentStoreResult<Option<Model>> {
        self.fetch_at(index).await
    }

    /// Counts every document matching the spec, ignoring limit and skip.
    pub async fn count(&self) -> DocumentStoreResult<u64> {
        self.collection().count(self.spec_or_all()).await
    }

    /// Applies `modifier` to every document matching the spec.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] if the cursor was created without a
    /// spec; pass an explicit empty spec to update the whole collection.
    pub async fn update(&self, modifier: Document) -> DocumentStoreResult<u64> {
        let Some(spec) = self.spec.clone() else {
            return Err(DocumentStoreError::InvalidArgument(
                "cannot update a cursor created without a spec".to_string(),
            ));
        };

        self.collection()
            .update(spec, modifier, true)
            .await
    }

    /// Sets `values` on every document matching the spec.
    pub async fn change(&self, values: Document) -> DocumentStoreResult<u64> {
        self.update(doc! { "$set": values }).await
    }

    async fn open(&mut self) -> DocumentStoreResult<()> {
        self.started = true;

        let options = FindOptions {
            sort: self.order.clone(),
            limit: self.limit,
            skip: self.skip,
        };

        let stream = self
            .collection()
            .stream(self.spec_or_all(), options, self.store.options().batch_size)
            .await?;

        self.stream = Some(stream);

        Ok(())
    }

    /// Returns the next document, decoded, or `None` once the cursor is exhausted.
    pub async fn next(&mut self) -> DocumentStoreResult<Option<Model>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.stream.is_none() {
            self.open().await?;
        }

        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        match stream.next().await {
            Some(Ok(document)) => self.kind.decode(document).map(Some),
            Some(Err(err)) => Err(err),
            None => {
                self.stream = None;
                self.exhausted = true;

                Ok(None)
            }
        }
    }

    /// Converts the cursor into a stream of decoded documents.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = DocumentStoreResult<Model>> + 'a {
        stream::unfold(self, |mut cursor| async move {
            match cursor.next().await {
                Ok(Some(model)) => Some((Ok(model), cursor)),
                Ok(None) => None,
                Err(err) => {
                    cursor.stream = None;
                    cursor.exhausted = true;

                    Some((Err(err), cursor))
                }
            }
        })
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("kind", &self.kind.name())
            .field("spec", &self.spec)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

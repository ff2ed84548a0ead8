//! Main document store interface.
//!
//! A [`DocumentStore`] owns a storage backend behind dynamic dispatch, together with the
//! [`StoreOptions`] that tune how models talk to it. Model kinds are not bound to a store:
//! every class-level and instance-level operation takes the store it should run against.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{memory::InMemoryStoreBuilder, store::DocumentStore};
//!
//! let store = DocumentStore::connect(InMemoryStoreBuilder::new()).await?;
//! let people = store.collection("person");
//! // ...
//! store.shutdown().await?;
//! ```

use serde::Deserialize;

use crate::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Default number of documents a cursor requests per round-trip.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Tunables for a [`DocumentStore`].
///
/// Deserializable so it can be embedded in an application's configuration file:
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct AppConfig {
///     #[serde(default)]
///     store: docmodel::store::StoreOptions,
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Number of documents a cursor fetches per backend round-trip.
    pub batch_size: usize,
}

impl StoreOptions {
    /// Sets the cursor batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn validate(&self) -> DocumentStoreResult<()> {
        if self.batch_size == 0 {
            return Err(DocumentStoreError::InvalidArgument(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE }
    }
}

/// A document store bound to a dynamically dispatched backend.
///
/// # Example
///
/// ```ignore
/// let store = DocumentStore::new(my_backend);
/// let users = store.collection("users");
/// ```
#[derive(Debug)]
pub struct DocumentStore {
    backend: Box<dyn DynStoreBackend>,
    options: StoreOptions,
}

impl DocumentStore {
    /// Creates a new document store over `backend` with default options.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
            options: StoreOptions::default(),
        }
    }

    /// Creates a new document store from a backend trait object.
    pub fn from_dyn(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend, options: StoreOptions::default() }
    }

    /// Builds the backend with `builder` and wraps it in a store.
    ///
    /// # Errors
    ///
    /// Returns the builder's error, typically [`DocumentStoreError::Initialization`].
    pub async fn connect<T>(builder: T) -> DocumentStoreResult<Self>
    where
        T: StoreBackendBuilder,
        T::Backend: 'static,
    {
        let backend = builder.build().await?;

        log::debug!("connected document store backend {:?}", backend);

        Ok(Self::new(backend))
    }

    /// Starts building a store over `backend` with non-default options.
    pub fn builder<B: StoreBackend + 'static>(backend: B) -> DocumentStoreBuilder {
        DocumentStoreBuilder {
            backend: Box::new(backend),
            options: StoreOptions::default(),
        }
    }

    /// Returns the store options.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Returns a handle on the collection `name`.
    pub fn collection<'a>(&'a self, name: &'a str) -> Collection<'a> {
        Collection::new(name, &*self.backend)
    }

    /// Returns the backend as its concrete type, if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }

    /// Drops (deletes) a collection with the given name.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.collection(name).drop().await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        log::debug!("shutting down document store");

        self.backend.shutdown_boxed().await?;

        Ok(())
    }
}

/// Builder for a [`DocumentStore`] with custom [`StoreOptions`].
///
/// ```ignore
/// let store = DocumentStore::builder(InMemoryStore::new())
///     .batch_size(2)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct DocumentStoreBuilder {
    backend: Box<dyn DynStoreBackend>,
    options: StoreOptions,
}

impl DocumentStoreBuilder {
    /// Replaces all options at once.
    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the number of documents a cursor fetches per round-trip.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidArgument`] if `batch_size` is zero.
    pub fn build(self) -> DocumentStoreResult<DocumentStore> {
        self.options.validate()?;

        Ok(DocumentStore {
            backend: self.backend,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_defaults() {
        let options: StoreOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, StoreOptions::default());

        let options: StoreOptions = serde_json::from_str(r#"{"batch_size": 2}"#).unwrap();
        assert_eq!(options.batch_size, 2);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(StoreOptions::default().with_batch_size(0).validate().is_err());
        assert!(StoreOptions::default().with_batch_size(1).validate().is_ok());
    }
}

//! Model instances and the kind-level operations that construct, find and persist them.
//!
//! A [`Model`] is a live document paired with the [`ModelKind`] that governs it. Reads and
//! writes of declared attributes go through the kind's [`Field`]s, so defaults, callbacks,
//! coercion and reference resolution apply uniformly no matter how an instance was made.
//!
//! Instance-level operations (`save`, `delete`, `update`) are scoped to one document.
//! Bulk destructive operations (`remove`, `drop_collection`) exist only on [`ModelKind`]:
//!
//! ```compile_fail
//! # use docmodel_core::{model::Model, store::DocumentStore};
//! # async fn purge(instance: &Model, store: &DocumentStore) {
//! instance.remove(store, Default::default()).await;
//! # }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! let mut foo = foo_kind.new(&store, doc! { "required": "yes", "bar": "hello" }).await?;
//! assert_eq!(foo.get("default")?, "default".into());
//!
//! foo.set("bar", "goodbye")?;
//! foo.save(&store).await?;
//!
//! let again = foo_kind.find_one(&store, doc! { "bar": "goodbye" }).await?;
//! assert_eq!(again.as_ref(), Some(&foo));
//! ```

use bson::{Bson, Document, doc};
use serde::de::DeserializeOwned;
use std::{fmt, ops::Index, sync::Arc};

use crate::{
    collection::Collection,
    cursor::Cursor,
    document::{ID_KEY, display_value, identity_spec},
    error::{DocumentStoreError, DocumentStoreResult},
    field::{Field, FieldInput},
    query::Search,
    schema::ModelKind,
    store::DocumentStore,
};

static NULL: Bson = Bson::Null;

/// A document governed by a model kind.
#[derive(Clone)]
pub struct Model {
    kind: Arc<ModelKind>,
    document: Document,
}

impl Model {
    /// Returns the kind governing this instance.
    pub fn kind(&self) -> &Arc<ModelKind> {
        &self.kind
    }

    /// Returns `true` if this instance is governed by exactly `kind`.
    pub fn is_kind(&self, kind: &Arc<ModelKind>) -> bool {
        Arc::ptr_eq(&self.kind, kind)
    }

    /// Returns the stored identity, if the instance has one.
    pub fn id(&self) -> Option<&Bson> {
        match self.document.get(ID_KEY) {
            None | Some(Bson::Null) => None,
            Some(id) => Some(id),
        }
    }

    /// Returns the live document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Returns a copy of the live document.
    pub fn copy(&self) -> Document {
        self.document.clone()
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Reads the declared attribute `name`.
    ///
    /// The identity key `_id` can be read on any kind.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownField`] if `name` is not declared and
    /// [`DocumentStoreError::EmptyRequiredField`] if a required value is absent.
    pub fn get(&mut self, name: &str) -> DocumentStoreResult<Bson> {
        match self.kind.field(name) {
            Some(field) => field.read(name, &mut self.document),
            None if name == ID_KEY => Ok(self.id().cloned().unwrap_or(Bson::Null)),
            None => Err(DocumentStoreError::UnknownField(
                name.to_string(),
                self.kind.name().to_string(),
            )),
        }
    }

    /// Writes `value` through the field declared as `name`.
    ///
    /// On an open-schema kind an unknown `name` gets a field created for it first.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownField`] for an unknown name on a closed-schema
    /// kind and [`DocumentStoreError::TypeMismatch`] if the value cannot be coerced or is
    /// not acceptable for a reference.
    pub fn set(&mut self, name: &str, value: impl Into<Bson>) -> DocumentStoreResult<()> {
        self.write(name, FieldInput::Value(value.into()))
    }

    /// Writes another instance through the field declared as `name`.
    ///
    /// Reference fields store the instance's identity; plain fields embed a copy of its
    /// document.
    pub fn set_instance(&mut self, name: &str, instance: &Model) -> DocumentStoreResult<()> {
        self.write(name, FieldInput::Instance(instance))
    }

    fn write(&mut self, name: &str, input: FieldInput<'_>) -> DocumentStoreResult<()> {
        match self.kind.field_or_auto(name)? {
            Some(field) => field.write(name, input, &mut self.document),
            None => {
                let value = match input {
                    FieldInput::Value(value) => value,
                    FieldInput::Instance(instance) => instance.id().cloned().unwrap_or(Bson::Null),
                };

                self.document.insert(name, value);
                Ok(())
            }
        }
    }

    /// Sets several declared attributes at once.
    ///
    /// Unlike construction, only declared attribute names are accepted, even on an
    /// open-schema kind, and nothing is written unless every key is valid.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidUpdateCall`] naming the first unknown key.
    pub fn update(&mut self, values: Document) -> DocumentStoreResult<()> {
        if let Some(key) = values.keys().find(|key| !self.kind.has_field(key)) {
            return Err(DocumentStoreError::InvalidUpdateCall(key.clone()));
        }

        let mut document = self.document.clone();

        for (key, value) in values {
            if let Some(field) = self.kind.field(&key) {
                field.write(&key, FieldInput::Value(value), &mut document)?;
            }
        }

        self.document = document;

        Ok(())
    }

    /// Reads every declared field, populating defaults and checking required values.
    fn validate(&mut self) -> DocumentStoreResult<()> {
        for (name, field) in self.kind.fields() {
            field.read(&name, &mut self.document)?;
        }

        Ok(())
    }

    /// Inserts or replaces this instance in its kind's collection.
    ///
    /// Defaults are populated before saving. On success the assigned identity is stored
    /// on the instance and returned.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::EmptyRequiredField`] if a required field is absent;
    /// nothing is sent to the store in that case.
    pub async fn save(&mut self, store: &DocumentStore) -> DocumentStoreResult<Bson> {
        self.validate()?;

        let id = self
            .kind
            .collection(store)
            .save(self.document.clone())
            .await?;

        self.document.insert(ID_KEY, id.clone());

        Ok(id)
    }

    /// Removes this instance's document from the store.
    ///
    /// An instance that was never saved has nothing to remove; the call is a no-op.
    pub async fn delete(&self, store: &DocumentStore) -> DocumentStoreResult<()> {
        let Some(id) = self.id() else {
            log::debug!("delete of an unsaved {} instance ignored", self.kind.name());
            return Ok(());
        };

        self.kind
            .collection(store)
            .remove(identity_spec(id.clone()))
            .await?;

        Ok(())
    }

    /// Fetches the record referenced by the reference field `name`.
    ///
    /// The record is fetched from the store on every call. A null reference, or one whose
    /// record no longer exists, yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::TypeMismatch`] if `name` is not a reference field.
    pub async fn get_reference(&mut self, name: &str, store: &DocumentStore) -> DocumentStoreResult<Option<Model>> {
        let field = self.kind.field(name).ok_or_else(|| {
            DocumentStoreError::UnknownField(name.to_string(), self.kind.name().to_string())
        })?;

        let Some(target) = field.reference_kind().cloned() else {
            return Err(DocumentStoreError::TypeMismatch(format!(
                "{name} is not a reference field"
            )));
        };

        match field.read(name, &mut self.document)? {
            Bson::Null => Ok(None),
            id => target.find_one(store, identity_spec(id)).await,
        }
    }

    /// Deserializes the live document into `T`.
    pub fn decode_into<T: DeserializeOwned>(&self) -> DocumentStoreResult<T> {
        Ok(bson::de::deserialize_from_bson(Bson::Document(self.document.clone()))?)
    }

    /// Renders the live document as JSON.
    pub fn to_json(&self) -> DocumentStoreResult<serde_json::Value> {
        Ok(serde_json::to_value(&self.document)?)
    }
}

impl PartialEq for Model {
    /// Instances are equal when both have been saved under the same identity.
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b && self.kind.collection_name() == other.kind.collection_name(),
            _ => false,
        }
    }
}

impl Index<&str> for Model {
    type Output = Bson;

    /// Returns the raw stored value, without defaults or callbacks; absent keys yield null.
    fn index(&self, key: &str) -> &Bson {
        self.document.get(key).unwrap_or(&NULL)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id().map(display_value);

        write!(
            f,
            "<Model:{} id:{}>",
            self.kind.collection_name(),
            id.as_deref().unwrap_or("none")
        )
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind.name())
            .field("document", &self.document)
            .finish()
    }
}

impl ModelKind {
    /// Returns a handle on this kind's collection in `store`.
    pub fn collection<'a>(&'a self, store: &'a DocumentStore) -> Collection<'a> {
        store.collection(self.collection_name())
    }

    /// Constructs an instance from `values` without touching the store.
    ///
    /// Each key is written through its field. Polymorphic kinds dispatch on the
    /// discriminator in `values` first.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownField`] for undeclared keys on a closed-schema
    /// kind, or any error of the field write path.
    pub fn create(self: &Arc<Self>, values: Document) -> DocumentStoreResult<Model> {
        let mut model = Model {
            kind: self.resolve(&values),
            document: Document::new(),
        };

        for (key, value) in values {
            model.set(&key, value)?;
        }

        Ok(model)
    }

    /// Runs the new-hook, constructs an instance and populates its declared defaults.
    ///
    /// This is [`new`](Self::new) without the save.
    pub fn prepare(self: &Arc<Self>, mut values: Document) -> DocumentStoreResult<Model> {
        if let Some(hook) = self.new_hook() {
            hook(&mut values);
        }

        let mut model = self.create(values)?;

        for (name, field) in model.kind.fields() {
            if field.default().is_some() {
                field.read(&name, &mut model.document)?;
            }
        }

        Ok(model)
    }

    /// Constructs an instance with defaults populated and saves it.
    ///
    /// # Errors
    ///
    /// Fails like [`create`](Self::create), or with
    /// [`DocumentStoreError::EmptyRequiredField`] if a required value was not supplied.
    pub async fn new(self: &Arc<Self>, store: &DocumentStore, values: Document) -> DocumentStoreResult<Model> {
        let mut model = self.prepare(values)?;
        model.save(store).await?;

        Ok(model)
    }

    /// Wraps a stored document into an instance of the kind it resolves to.
    ///
    /// The document is kept verbatim. Every key must be known to the resolved kind, or is
    /// added to it on an open-schema kind.
    pub fn decode(self: &Arc<Self>, document: Document) -> DocumentStoreResult<Model> {
        let kind = self.resolve(&document);

        for key in document.keys() {
            kind.field_or_auto(key)?;
        }

        Ok(Model { kind, document })
    }

    /// Returns a lazy cursor over the documents matching `spec`.
    ///
    /// `None` matches every document but, unlike an explicit empty spec, cannot be used
    /// for a bulk [`Cursor::update`].
    pub fn find<'a>(self: &Arc<Self>, store: &'a DocumentStore, spec: impl Into<Option<Document>>) -> Cursor<'a> {
        Cursor::new(Arc::clone(self), store, spec.into())
    }

    /// Returns the first document matching `spec`, decoded.
    pub async fn find_one(
        self: &Arc<Self>,
        store: &DocumentStore,
        spec: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<Option<Model>> {
        let spec = spec.into().unwrap_or_default();

        self.collection(store)
            .find_one(spec)
            .await?
            .map(|document| self.decode(document))
            .transpose()
    }

    /// Counts the documents matching `spec`.
    pub async fn count(&self, store: &DocumentStore, spec: impl Into<Option<Document>>) -> DocumentStoreResult<u64> {
        self.collection(store)
            .count(spec.into().unwrap_or_default())
            .await
    }

    /// Returns a cursor over the documents matching the search terms.
    pub fn search<'a>(self: &Arc<Self>, store: &'a DocumentStore, search: Search) -> Cursor<'a> {
        self.find(store, search.into_spec())
    }

    /// Removes every document matching `spec` and returns how many were removed.
    pub async fn remove(&self, store: &DocumentStore, spec: Document) -> DocumentStoreResult<u64> {
        self.collection(store).remove(spec).await
    }

    /// Drops this kind's collection.
    pub async fn drop_collection(&self, store: &DocumentStore) -> DocumentStoreResult<()> {
        self.collection(store).drop().await
    }

    /// Applies `modifier` to the first (or, with `multi`, every) document matching `spec`.
    pub async fn update(
        &self,
        store: &DocumentStore,
        spec: Document,
        modifier: Document,
        multi: bool,
    ) -> DocumentStoreResult<u64> {
        self.collection(store)
            .update(spec, modifier, multi)
            .await
    }

    /// Sets `values` on every document matching `spec`.
    pub async fn change(&self, store: &DocumentStore, spec: Document, values: Document) -> DocumentStoreResult<u64> {
        self.update(store, spec, doc! { "$set": values }, true).await
    }
}

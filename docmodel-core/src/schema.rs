//! Model kinds: the per-kind schema shared by every instance.
//!
//! A [`ModelKind`] is built once (usually at startup) with [`ModelKind::builder`] and then
//! shared as `Arc<ModelKind>`. It owns the field table, i.e. the mapping from attribute
//! name to [`Field`] and from field identity back to attribute name, the collection name,
//! the unknown-field policy ([`SchemaMode`]), and, for polymorphic hierarchies, a handle on
//! the shared discriminator registry.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{field::Field, schema::ModelKind};
//!
//! let company = ModelKind::builder("Company")
//!     .field("name", Field::new().required())
//!     .build()?;
//!
//! let person = ModelKind::builder("Person")
//!     .field("name", Field::new())
//!     .field("company", Field::reference(&company))
//!     .build()?;
//! ```

use bson::Document;
use parking_lot::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    field::{Field, FieldId},
    poly::PolyRegistry,
};

/// Policy for keys that match no declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// Unknown keys fail with [`DocumentStoreError::UnknownField`].
    #[default]
    Closed,
    /// Unknown keys get an unnamed field appended to the kind on the fly.
    Open,
}

/// Hook run over the construction values by [`ModelKind::new`] and [`ModelKind::prepare`].
///
/// This is where a kind injects mandatory values before construction.
pub type NewHook = Arc<dyn Fn(&mut Document) + Send + Sync>;

/// Attribute table of a kind. Append-only once the kind is built.
#[derive(Debug, Default, Clone)]
pub(crate) struct FieldTable {
    order: Vec<String>,
    by_name: HashMap<String, Arc<Field>>,
    names: HashMap<FieldId, String>,
}

impl FieldTable {
    /// Inserts `field` under `name`, shadowing a previous field of the same name.
    fn insert(&mut self, name: String, field: Arc<Field>) {
        match self.by_name.insert(name.clone(), Arc::clone(&field)) {
            Some(shadowed) => {
                self.names.remove(&shadowed.id());
            }
            None => self.order.push(name.clone()),
        }

        self.names.insert(field.id(), name);
    }

    fn get(&self, name: &str) -> Option<Arc<Field>> {
        self.by_name.get(name).cloned()
    }

    fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

pub(crate) fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

/// The schema of one model kind.
pub struct ModelKind {
    name: String,
    collection: String,
    fields: RwLock<FieldTable>,
    mode: SchemaMode,
    new_hook: Option<NewHook>,
    poly: Option<Arc<PolyRegistry>>,
}

impl ModelKind {
    /// Starts the definition of a new kind.
    ///
    /// The collection name defaults to `name` in lowercase.
    pub fn builder(name: impl Into<String>) -> ModelKindBuilder {
        ModelKindBuilder::new(name.into())
    }

    /// Returns the kind's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the collection backing this kind.
    ///
    /// Every variant of a polymorphic hierarchy returns its root's collection.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn mode(&self) -> SchemaMode {
        self.mode
    }

    /// Returns the field registered under the attribute `name`.
    pub fn field(&self, name: &str) -> Option<Arc<Field>> {
        self.fields.read().get(name)
    }

    /// Returns `true` if an attribute `name` is declared on this kind.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.read().contains(name)
    }

    /// Returns the declared attribute names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().order.clone()
    }

    /// Returns every `(attribute name, field)` pair in declaration order.
    pub fn fields(&self) -> Vec<(String, Arc<Field>)> {
        let table = self.fields.read();

        table
            .order
            .iter()
            .filter_map(|name| table.by_name.get(name).map(|field| (name.clone(), Arc::clone(field))))
            .collect()
    }

    /// Looks up the attribute name `field` is registered under, by identity.
    ///
    /// A field that is not registered on this kind returns `None`, even if another field
    /// with the same attribute name is.
    pub fn field_name(&self, field: &Field) -> Option<String> {
        self.fields.read().names.get(&field.id()).cloned()
    }

    /// Attaches a new field to this kind.
    ///
    /// The field is visible immediately to existing and new instances. Kinds that were
    /// built with [`ModelKindBuilder::extends`] before this call keep the table they copied.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidFieldName`] for private (`_`-prefixed) names and
    /// [`DocumentStoreError::FieldAlreadyExists`] if the name is taken.
    pub fn add_field(&self, name: impl Into<String>, field: Field) -> DocumentStoreResult<Arc<Field>> {
        let name = name.into();

        if name.is_empty() || is_private(&name) {
            return Err(DocumentStoreError::InvalidFieldName(name));
        }

        let mut table = self.fields.write();

        if table.contains(&name) {
            return Err(DocumentStoreError::FieldAlreadyExists(name, self.name.clone()));
        }

        let field = Arc::new(field);
        table.insert(name, Arc::clone(&field));

        Ok(field)
    }

    /// Returns the field for `name`, synthesizing one if the schema is open.
    ///
    /// The identity key is accepted by every kind and never gets a field.
    pub(crate) fn field_or_auto(&self, name: &str) -> DocumentStoreResult<Option<Arc<Field>>> {
        if let Some(field) = self.field(name) {
            return Ok(Some(field));
        }

        if name == crate::document::ID_KEY {
            return Ok(None);
        }

        if self.mode == SchemaMode::Closed || is_private(name) {
            return Err(DocumentStoreError::UnknownField(name.to_string(), self.name.clone()));
        }

        let mut table = self.fields.write();

        // another writer may have created it since the read above
        if let Some(field) = table.get(name) {
            return Ok(Some(field));
        }

        log::trace!("auto-creating field {} on model {}", name, self.name);

        let field = Arc::new(Field::new());
        table.insert(name.to_string(), Arc::clone(&field));

        Ok(Some(field))
    }

    pub(crate) fn new_hook(&self) -> Option<&NewHook> {
        self.new_hook.as_ref()
    }

    pub(crate) fn poly(&self) -> Option<&Arc<PolyRegistry>> {
        self.poly.as_ref()
    }
}

impl fmt::Debug for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelKind")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("fields", &self.field_names())
            .field("mode", &self.mode)
            .field("child_key", &self.poly.as_ref().map(|poly| poly.child_key().to_string()))
            .finish()
    }
}

enum Registration {
    Default,
    Named(String),
}

/// Builder for [`ModelKind`].
pub struct ModelKindBuilder {
    name: String,
    collection: Option<String>,
    parent: Option<Arc<ModelKind>>,
    fields: Vec<(String, Field)>,
    mode: Option<SchemaMode>,
    new_hook: Option<NewHook>,
    child_key: Option<String>,
    registration: Option<Registration>,
}

impl ModelKindBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            collection: None,
            parent: None,
            fields: Vec::new(),
            mode: None,
            new_hook: None,
            child_key: None,
            registration: None,
        }
    }

    /// Declares a field. Private (`_`-prefixed) names are not part of the schema and are skipped.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();

        if is_private(&name) {
            log::debug!("skipping private attribute {} on model {}", name, self.name);
            return self;
        }

        self.fields.push((name, field));
        self
    }

    /// Overrides the collection name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Inherits the parent's fields, schema mode and new-hook.
    ///
    /// Fields declared on this builder augment the inherited ones and shadow inherited
    /// fields of the same name. Extending a polymorphic kind joins its hierarchy: the new
    /// kind shares the root's collection and discriminator registry.
    pub fn extends(mut self, parent: &Arc<ModelKind>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Sets the unknown-field policy. Defaults to the parent's, or [`SchemaMode::Closed`].
    pub fn mode(mut self, mode: SchemaMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Shorthand for `mode(SchemaMode::Open)`.
    pub fn auto_create_fields(self) -> Self {
        self.mode(SchemaMode::Open)
    }

    /// Sets a hook run over the construction values of [`ModelKind::new`] / [`ModelKind::prepare`].
    pub fn new_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Document) + Send + Sync + 'static,
    {
        self.new_hook = Some(Arc::new(hook));
        self
    }

    /// Makes this kind the root of a polymorphic hierarchy, discriminated by `child_key`.
    pub fn polymorphic(mut self, child_key: impl Into<String>) -> Self {
        self.child_key = Some(child_key.into());
        self
    }

    /// Registers the built kind with its polymorphic parent under its lowercased name.
    pub fn registered(mut self) -> Self {
        self.registration = Some(Registration::Default);
        self
    }

    /// Registers the built kind with its polymorphic parent under `name`.
    pub fn registered_as(mut self, name: impl Into<String>) -> Self {
        self.registration = Some(Registration::Named(name.into()));
        self
    }

    /// Builds the kind.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidOperation`] if a polymorphic variant declares
    /// its own root or collection, or if registration is requested without a polymorphic
    /// parent.
    pub fn build(self) -> DocumentStoreResult<Arc<ModelKind>> {
        let inherited_poly = self
            .parent
            .as_ref()
            .and_then(|parent| parent.poly().cloned());

        if inherited_poly.is_some() && (self.child_key.is_some() || self.collection.is_some()) {
            return Err(DocumentStoreError::InvalidOperation(format!(
                "{} extends a polymorphic model and cannot declare its own root or collection",
                self.name
            )));
        }

        if self.registration.is_some() && inherited_poly.is_none() {
            return Err(DocumentStoreError::InvalidOperation(format!(
                "{} cannot be registered: it does not extend a polymorphic model",
                self.name
            )));
        }

        let mut table = self
            .parent
            .as_ref()
            .map(|parent| parent.fields.read().clone())
            .unwrap_or_default();

        for (name, field) in self.fields {
            table.insert(name, Arc::new(field));
        }

        let collection = match (&inherited_poly, &self.parent, self.collection) {
            (Some(_), Some(parent), _) => parent.collection.clone(),
            (_, _, Some(collection)) => collection,
            _ => self.name.to_lowercase(),
        };
        let mode = self
            .mode
            .or_else(|| self.parent.as_ref().map(|parent| parent.mode))
            .unwrap_or_default();
        let new_hook = self
            .new_hook
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.new_hook.clone()));
        let name = self.name;

        let kind = match self.child_key {
            Some(child_key) => Arc::new_cyclic(|root| ModelKind {
                name,
                collection,
                fields: RwLock::new(table),
                mode,
                new_hook,
                poly: Some(Arc::new(PolyRegistry::new(child_key, root.clone()))),
            }),
            None => Arc::new(ModelKind {
                name,
                collection,
                fields: RwLock::new(table),
                mode,
                new_hook,
                poly: inherited_poly,
            }),
        };

        match self.registration {
            Some(Registration::Default) => kind.register(&kind)?,
            Some(Registration::Named(name)) => kind.register_as(name, &kind)?,
            None => {}
        }

        Ok(kind)
    }
}

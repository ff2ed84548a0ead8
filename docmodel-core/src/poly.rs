//! Polymorphic hierarchies: discriminator-based resolution of a document's concrete kind.
//!
//! A root kind declares a discriminator attribute with
//! [`ModelKindBuilder::polymorphic`](crate::schema::ModelKindBuilder::polymorphic). Kinds
//! built with `extends` from the root share its collection and its [`PolyRegistry`], and
//! are registered under a discriminator value. Decoding a document then picks the kind by
//! the value it carries:
//!
//! - a registered value resolves to that variant,
//! - an unregistered value resolves to the root,
//! - a missing value resolves to the kind the call was issued on.
//!
//! ```ignore
//! let person = ModelKind::builder("Person")
//!     .polymorphic("role")
//!     .field("role", Field::new().default_value("person"))
//!     .build()?;
//! let child = ModelKind::builder("Child")
//!     .extends(&person)
//!     .field("role", Field::new().default_value("child"))
//!     .registered()
//!     .build()?;
//!
//! let instance = person.create(doc! { "role": "child" })?;
//! assert!(instance.is_kind(&child));
//! ```

use bson::{Bson, Document};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    document::display_value,
    error::{DocumentStoreError, DocumentStoreResult},
    schema::ModelKind,
};

/// Discriminator registry shared by a polymorphic root and all of its variants.
///
/// The registry holds weak handles so a hierarchy can be dropped like any other set of
/// kinds; an entry whose kind is gone is treated as unregistered.
pub struct PolyRegistry {
    child_key: String,
    root: Weak<ModelKind>,
    variants: RwLock<HashMap<String, Weak<ModelKind>>>,
}

impl PolyRegistry {
    pub(crate) fn new(child_key: String, root: Weak<ModelKind>) -> Self {
        Self {
            child_key,
            root,
            variants: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the discriminator attribute name.
    pub fn child_key(&self) -> &str {
        &self.child_key
    }

    /// Returns the root kind of the hierarchy, if it is still alive.
    pub fn root(&self) -> Option<Arc<ModelKind>> {
        self.root.upgrade()
    }

    /// Returns the kind registered under `name`.
    pub fn variant(&self, name: &str) -> Option<Arc<ModelKind>> {
        let variants = self.variants.read();
        let entry = variants.get(name)?;

        match entry.upgrade() {
            Some(kind) => Some(kind),
            None => {
                log::warn!(
                    "discriminator {}={} refers to a dropped model kind",
                    self.child_key,
                    name
                );
                None
            }
        }
    }

    /// Returns the registered discriminator values, sorted.
    pub fn variant_names(&self) -> Vec<String> {
        let mut names = self.variants.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    fn insert(&self, name: String, kind: &Arc<ModelKind>) {
        log::debug!(
            "registering {} as {}={} in hierarchy of {}",
            kind.name(),
            self.child_key,
            name,
            kind.collection_name()
        );

        self.variants.write().insert(name, Arc::downgrade(kind));
    }
}

impl fmt::Debug for PolyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolyRegistry")
            .field("child_key", &self.child_key)
            .field("variants", &self.variant_names())
            .finish()
    }
}

impl ModelKind {
    /// Returns `true` if this kind belongs to a polymorphic hierarchy.
    pub fn is_polymorphic(&self) -> bool {
        self.poly().is_some()
    }

    /// Returns the discriminator attribute name of this kind's hierarchy.
    pub fn child_key(&self) -> Option<&str> {
        self.poly().map(|poly| poly.child_key())
    }

    /// Registers `variant` under its lowercased name.
    ///
    /// See [`register_as`](Self::register_as).
    pub fn register(&self, variant: &Arc<ModelKind>) -> DocumentStoreResult<()> {
        self.register_as(variant.name().to_lowercase(), variant)
    }

    /// Registers `variant` in this kind's hierarchy under the discriminator value `name`.
    ///
    /// Registering a value again replaces the previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidOperation`] if this kind is not polymorphic and
    /// [`DocumentStoreError::TypeMismatch`] if `variant` does not belong to the hierarchy.
    pub fn register_as(&self, name: impl Into<String>, variant: &Arc<ModelKind>) -> DocumentStoreResult<()> {
        let Some(poly) = self.poly() else {
            return Err(DocumentStoreError::InvalidOperation(format!(
                "{} is not a polymorphic model",
                self.name()
            )));
        };

        match variant.poly() {
            Some(other) if Arc::ptr_eq(poly, other) => {}
            _ => {
                return Err(DocumentStoreError::TypeMismatch(format!(
                    "{} does not extend the polymorphic root of {}",
                    variant.name(),
                    self.name()
                )));
            }
        }

        poly.insert(name.into(), variant);

        Ok(())
    }

    /// Returns the variant registered under the discriminator value `name`.
    pub fn variant(&self, name: &str) -> Option<Arc<ModelKind>> {
        self.poly().and_then(|poly| poly.variant(name))
    }

    /// Picks the concrete kind for `document`.
    ///
    /// Non-polymorphic kinds always resolve to themselves.
    pub fn resolve(self: &Arc<Self>, document: &Document) -> Arc<ModelKind> {
        let Some(poly) = self.poly() else {
            return Arc::clone(self);
        };

        let value = match document.get(poly.child_key()) {
            None | Some(Bson::Null) => return Arc::clone(self),
            Some(value) => display_value(value),
        };

        if let Some(variant) = poly.variant(&value) {
            return variant;
        }

        log::warn!(
            "unregistered discriminator {}={} on {}, falling back to the root model",
            poly.child_key(),
            value,
            self.collection_name()
        );

        poly.root().unwrap_or_else(|| Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use bson::doc;

    fn hierarchy() -> (Arc<ModelKind>, Arc<ModelKind>, Arc<ModelKind>) {
        let person = ModelKind::builder("Person")
            .polymorphic("role")
            .field("role", Field::new().default_value("person"))
            .field("name", Field::new())
            .build()
            .unwrap();
        let child = ModelKind::builder("Child")
            .extends(&person)
            .field("role", Field::new().default_value("child"))
            .registered()
            .build()
            .unwrap();
        let infant = ModelKind::builder("Infant")
            .extends(&person)
            .field("age", Field::new())
            .registered_as("infant")
            .build()
            .unwrap();

        (person, child, infant)
    }

    #[test]
    fn variants_share_root_collection() {
        let (person, child, infant) = hierarchy();

        assert_eq!(child.collection_name(), person.collection_name());
        assert_eq!(infant.collection_name(), "person");
        assert_eq!(child.child_key(), Some("role"));
        assert_eq!(person.poly().unwrap().variant_names(), vec!["child", "infant"]);
    }

    #[test]
    fn resolves_registered_unregistered_and_absent() {
        let (person, child, infant) = hierarchy();

        assert!(Arc::ptr_eq(&person.resolve(&doc! { "role": "child" }), &child));
        assert!(Arc::ptr_eq(&child.resolve(&doc! { "role": "infant" }), &infant));
        assert!(Arc::ptr_eq(&child.resolve(&doc! { "role": "person" }), &person));
        assert!(Arc::ptr_eq(&child.resolve(&doc! { "name": "x" }), &child));
        assert!(Arc::ptr_eq(&infant.resolve(&doc! { "role": Bson::Null }), &infant));
    }

    #[test]
    fn foreign_kinds_cannot_register() {
        let (person, _, _) = hierarchy();
        let stranger = ModelKind::builder("Stranger").build().unwrap();

        assert!(matches!(
            person.register(&stranger),
            Err(DocumentStoreError::TypeMismatch(_))
        ));
        assert!(matches!(
            stranger.register(&stranger),
            Err(DocumentStoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn dropped_variants_fall_back_to_root() {
        let (person, _, _) = hierarchy();

        {
            let _temporary = ModelKind::builder("Temporary")
                .extends(&person)
                .registered()
                .build()
                .unwrap();
        }

        assert!(person.variant("temporary").is_none());
        assert!(Arc::ptr_eq(&person.resolve(&doc! { "role": "temporary" }), &person));
    }
}

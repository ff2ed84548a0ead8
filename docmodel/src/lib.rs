//! Main docmodel crate providing a unified interface for schema-enforcing document models.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types and functionality from various sub-crates and provides
//! convenient access to different storage backends.
//!
//! # Features
//!
//! - **Declared schemas** - Fields with coercion, defaults, required-ness and accessor callbacks
//! - **Open schemas** - Kinds that grow a field for every unknown attribute they see
//! - **Polymorphic models** - One collection decoded into several kinds by a discriminator
//! - **Lazy cursors** - Chainable ordering and paging, streamed results, bulk updates
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::connect(InMemoryStore::builder()).await?;
//!
//!     let company = ModelKind::builder("Company")
//!         .field("name", Field::typed(FieldType::String).required())
//!         .build()?;
//!     let person = ModelKind::builder("Person")
//!         .field("name", Field::new())
//!         .field("company", Field::reference(&company))
//!         .build()?;
//!
//!     let acme = company.new(&store, doc! { "name": "Acme" }).await?;
//!
//!     let mut alice = person.new(&store, doc! { "name": "Alice" }).await?;
//!     alice.set_instance("company", &acme)?;
//!     alice.save(&store).await?;
//!
//!     let staff = person.search(&store, Search::new().instance("company", &acme));
//!     assert_eq!(staff.count().await?, 1);
//!
//!     store.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Polymorphic Models
//!
//! A polymorphic root names the attribute that discriminates its variants. Documents
//! decoded through any kind of the hierarchy come back as the kind their discriminator
//! was registered under.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use bson::doc;
//!
//! let person = ModelKind::builder("Person")
//!     .polymorphic("role")
//!     .field("role", Field::typed(FieldType::String).default_value("person"))
//!     .build()?;
//! let child = ModelKind::builder("Child")
//!     .extends(&person)
//!     .field("role", Field::typed(FieldType::String).default_value("child"))
//!     .registered()
//!     .build()?;
//!
//! let model = person.create(doc! { "role": "child" })?;
//! assert!(model.is_kind(&child));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, collection, cursor, document, error, field, model, poly, query, schema, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

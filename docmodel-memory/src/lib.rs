//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Insertion order** - Unsorted finds return documents in the order they were first saved
//! - **Spec evaluation** - Equality, comparison, membership and logical operators, dotted paths
//! - **Modifiers** - `$set`, `$unset`, `$inc` and replacement updates
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{field::Field, schema::ModelKind, store::DocumentStore, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::connect(InMemoryStore::builder()).await?;
//!
//!     let user = ModelKind::builder("User")
//!         .field("name", Field::new().required())
//!         .build()?;
//!
//!     let alice = user.new(&store, doc! { "name": "Alice" }).await?;
//!     assert_eq!(user.count(&store, None).await?, 1);
//!
//!     Ok(())
//! }
//! ```

pub mod store;
pub mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

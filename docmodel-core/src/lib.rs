//! A schema-enforcing object-document mapper over a pluggable document store.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Fields** ([`field`]) - Typing, defaults, required-ness and accessor callbacks for attributes
//! - **Model kinds** ([`schema`]) - Per-kind schemas built once and shared by every instance
//! - **Model instances** ([`model`]) - Live documents with schema-checked reads and writes, plus CRUD
//! - **Polymorphism** ([`poly`]) - Discriminator-based dispatch of one collection into several kinds
//! - **Cursors** ([`cursor`]) - Lazy, paged iteration with ordering, slicing and bulk updates
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Collections interface** ([`collection`]) - Raw document operations on one collection
//! - **Document store** ([`store`]) - The backend owner models run against
//! - **Query helpers** ([`query`]) - Sort entries, paging options and keyword searches
//! - **Error handling** ([`error`]) - Comprehensive error types and result types
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docmodel_core::{field::Field, schema::ModelKind};
//!
//! let company = ModelKind::builder("Company")
//!     .field("name", Field::new().required())
//!     .build()?;
//!
//! let acme = company.new(&store, doc! { "name": "Acme" }).await?;
//! let found = company.find_one(&store, doc! { "name": "Acme" }).await?;
//! assert_eq!(found, Some(acme));
//! ```

pub mod backend;
pub mod collection;
pub mod cursor;
pub mod document;
pub mod error;
pub mod field;
pub mod model;
pub mod poly;
pub mod query;
pub mod schema;
pub mod store;

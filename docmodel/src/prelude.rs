//! Convenient re-exports of commonly used types from docmodel.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Fields, model kinds and model instances
//! - Cursors and query helpers
//! - Store backends and builders
//! - Error types

pub use docmodel_core::{
    backend::{StoreBackend, DynStoreBackend, StoreBackendBuilder},
    collection::Collection,
    cursor::Cursor,
    field::{Field, FieldDefault, FieldId, FieldType},
    model::Model,
    query::{FindOptions, Search, Sort, SortDirection},
    schema::{ModelKind, ModelKindBuilder, SchemaMode},
    store::{DocumentStore, DocumentStoreBuilder, StoreOptions},
    error::{DocumentStoreError, DocumentStoreResult},
};

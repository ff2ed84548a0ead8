//! Error types and result types for model and document store operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Schema
//! violations (unknown or missing fields, bad coercions) and store failures share
//! one error enum so callers can propagate both with `?`.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when working with models and a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A keyword or document key matches no declared field and the kind's schema is closed.
    /// The first argument is the key, the second is the model kind.
    #[error("Unknown field {0} on model {1}")]
    UnknownField(String, String),
    /// A required field was read, or a save attempted, while its value is absent.
    #[error("Required field {0} is empty")]
    EmptyRequiredField(String),
    /// `Model::update` received a key that is not a declared attribute name.
    #[error("Invalid update call: {0} is not a declared field")]
    InvalidUpdateCall(String),
    /// A value or argument had the wrong type (coercion failure, bad reference write,
    /// invalid sort direction, foreign kind registration).
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// An argument had an acceptable type but an unacceptable value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is not allowed in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// A field with this attribute name is already registered on the kind.
    /// The first argument is the field name, the second is the model kind.
    #[error("Field {0} already exists on model {1}")]
    FieldAlreadyExists(String, String),
    /// The attribute name cannot be used for a field.
    #[error("Invalid field name: {0}")]
    InvalidFieldName(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document (or spec, or modifier) has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for model and document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

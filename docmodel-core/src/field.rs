//! Field descriptors: typing, defaults, required-ness and accessor callbacks.
//!
//! A [`Field`] mediates between an attribute value and its stored representation. Every
//! read and write of a model attribute goes through [`Field::read`] / [`Field::write`], so
//! callbacks, defaults and coercion are applied uniformly.
//!
//! Each field gets a [`FieldId`] when it is constructed. The owning [`ModelKind`] maps that
//! identity to the attribute name it was registered under, and the attribute name doubles
//! as the storage key in the document.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::field::{Field, FieldType};
//!
//! let uid = Field::typed(FieldType::String).required();
//! let created = Field::typed(FieldType::DateTime).default_with(|| bson::DateTime::now().into());
//! let slug = Field::new().set_callback(|value| match value {
//!     bson::Bson::String(s) => bson::Bson::String(s.to_lowercase()),
//!     other => other,
//! });
//! ```

use bson::{Bson, Document, Uuid, spec::BinarySubtype};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    document::{display_value, is_identity},
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    schema::ModelKind,
};

static NEXT_FIELD_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`Field`], unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

impl FieldId {
    fn next() -> Self {
        FieldId(NEXT_FIELD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A pure transformation applied to a value on read or on write.
pub type Callback = Arc<dyn Fn(Bson) -> Bson + Send + Sync>;

/// Default value of a field.
#[derive(Clone)]
pub enum FieldDefault {
    /// A fixed value, cloned into each instance that needs it.
    Value(Bson),
    /// A producer called afresh for each instance that needs a value.
    Producer(Arc<dyn Fn() -> Bson + Send + Sync>),
}

impl FieldDefault {
    /// Returns a new default value.
    pub fn produce(&self) -> Bson {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Producer(producer) => producer(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Coercion target of a typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int32,
    Int64,
    Double,
    Boolean,
    /// BSON date-time; accepts RFC 3339 strings and integer milliseconds since the epoch.
    DateTime,
    /// UUID binary; accepts hyphenated or simple UUID strings.
    Uuid,
    Document,
    Array,
}

impl FieldType {
    /// Returns `true` if `value` is already an instance of this type.
    pub fn matches(&self, value: &Bson) -> bool {
        match (self, value) {
            (FieldType::String, Bson::String(_))
            | (FieldType::Int32, Bson::Int32(_))
            | (FieldType::Int64, Bson::Int64(_))
            | (FieldType::Double, Bson::Double(_))
            | (FieldType::Boolean, Bson::Boolean(_))
            | (FieldType::DateTime, Bson::DateTime(_))
            | (FieldType::Document, Bson::Document(_))
            | (FieldType::Array, Bson::Array(_)) => true,
            (FieldType::Uuid, Bson::Binary(binary)) => binary.subtype == BinarySubtype::Uuid,
            _ => false,
        }
    }

    /// Converts `value` into this type.
    ///
    /// Null and values already of this type pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::TypeMismatch`] if no conversion exists.
    pub fn coerce(&self, value: Bson) -> DocumentStoreResult<Bson> {
        if value == Bson::Null || self.matches(&value) {
            return Ok(value);
        }

        let coerced = match (self, &value) {
            (FieldType::String, Bson::Int32(v)) => Some(Bson::String(v.to_string())),
            (FieldType::String, Bson::Int64(v)) => Some(Bson::String(v.to_string())),
            (FieldType::String, Bson::Double(v)) => Some(Bson::String(v.to_string())),
            (FieldType::String, Bson::Boolean(v)) => Some(Bson::String(v.to_string())),
            (FieldType::String, Bson::ObjectId(_) | Bson::Binary(_)) => {
                Some(Bson::String(display_value(&value)))
            }
            (FieldType::String, Bson::DateTime(v)) => Some(Bson::String(v.to_chrono().to_rfc3339())),

            (FieldType::Int32, Bson::Int64(v)) => i32::try_from(*v).ok().map(Bson::Int32),
            (FieldType::Int32, Bson::Double(v)) => integral(*v)
                .and_then(|v| i32::try_from(v).ok())
                .map(Bson::Int32),
            (FieldType::Int32, Bson::String(v)) => v.trim().parse::<i32>().ok().map(Bson::Int32),
            (FieldType::Int32, Bson::Boolean(v)) => Some(Bson::Int32(i32::from(*v))),

            (FieldType::Int64, Bson::Int32(v)) => Some(Bson::Int64(i64::from(*v))),
            (FieldType::Int64, Bson::Double(v)) => integral(*v).map(Bson::Int64),
            (FieldType::Int64, Bson::String(v)) => v.trim().parse::<i64>().ok().map(Bson::Int64),
            (FieldType::Int64, Bson::Boolean(v)) => Some(Bson::Int64(i64::from(*v))),

            (FieldType::Double, Bson::Int32(v)) => Some(Bson::Double(f64::from(*v))),
            (FieldType::Double, Bson::Int64(v)) => Some(Bson::Double(*v as f64)),
            (FieldType::Double, Bson::String(v)) => v.trim().parse::<f64>().ok().map(Bson::Double),

            (FieldType::Boolean, Bson::Int32(v)) => Some(Bson::Boolean(*v != 0)),
            (FieldType::Boolean, Bson::Int64(v)) => Some(Bson::Boolean(*v != 0)),
            (FieldType::Boolean, Bson::String(v)) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Bson::Boolean(true)),
                "false" | "0" => Some(Bson::Boolean(false)),
                _ => None,
            },

            (FieldType::DateTime, Bson::String(v)) => chrono::DateTime::parse_from_rfc3339(v.trim())
                .ok()
                .map(|dt| Bson::DateTime(bson::DateTime::from_chrono(dt.with_timezone(&chrono::Utc)))),
            (FieldType::DateTime, Bson::Int64(v)) => Some(Bson::DateTime(bson::DateTime::from_millis(*v))),
            (FieldType::DateTime, Bson::Int32(v)) => {
                Some(Bson::DateTime(bson::DateTime::from_millis(i64::from(*v))))
            }

            (FieldType::Uuid, Bson::String(v)) => Uuid::parse_str(v.trim()).ok().map(Bson::from),

            _ => None,
        };

        coerced.ok_or_else(|| {
            DocumentStoreError::TypeMismatch(format!("cannot coerce {value} into {self:?}"))
        })
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15).then_some(value as i64)
}

/// What is being written through a field.
pub(crate) enum FieldInput<'a> {
    Value(Bson),
    Instance(&'a Model),
}

/// An attribute descriptor on a model kind.
///
/// Fields are immutable once built and are shared as `Arc<Field>` by every kind that
/// registers them (a child kind built with `extends` shares its parent's fields).
pub struct Field {
    id: FieldId,
    field_type: Option<FieldType>,
    default: Option<FieldDefault>,
    required: bool,
    get_callback: Option<Callback>,
    set_callback: Option<Callback>,
    reference: Option<Arc<ModelKind>>,
}

impl Field {
    /// Creates an untyped, optional field with no default and no callbacks.
    pub fn new() -> Self {
        Self {
            id: FieldId::next(),
            field_type: None,
            default: None,
            required: false,
            get_callback: None,
            set_callback: None,
            reference: None,
        }
    }

    /// Creates a field whose written values are coerced into `field_type`.
    pub fn typed(field_type: FieldType) -> Self {
        Self { field_type: Some(field_type), ..Self::new() }
    }

    /// Creates a reference field pointing at records of `kind`.
    ///
    /// The stored value is always the referenced record's identity.
    pub fn reference(kind: &Arc<ModelKind>) -> Self {
        Self { reference: Some(Arc::clone(kind)), ..Self::new() }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a fixed default value.
    pub fn default_value(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Sets a default producer, called once per instance that needs a value.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Bson + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Producer(Arc::new(producer)));
        self
    }

    /// Sets the transformation applied to stored values when they are read.
    pub fn get_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Bson) -> Bson + Send + Sync + 'static,
    {
        self.get_callback = Some(Arc::new(callback));
        self
    }

    /// Sets the transformation applied to values before they are stored.
    pub fn set_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Bson) -> Bson + Send + Sync + 'static,
    {
        self.set_callback = Some(Arc::new(callback));
        self
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    pub fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the referenced kind if this is a reference field.
    pub fn reference_kind(&self) -> Option<&Arc<ModelKind>> {
        self.reference.as_ref()
    }

    /// Returns `true` if `document` has no entry under `key`. A stored null is a value.
    pub(crate) fn is_absent(document: &Document, key: &str) -> bool {
        !document.contains_key(key)
    }

    /// Reads the value stored under `key`.
    ///
    /// A missing value is replaced by the default, which is stored into `document` and
    /// returned as is. Without a default, a missing required value fails. Anything else,
    /// null included, is passed through the get-callback.
    pub(crate) fn read(&self, key: &str, document: &mut Document) -> DocumentStoreResult<Bson> {
        if Self::is_absent(document, key) {
            if let Some(default) = &self.default {
                let value = default.produce();
                document.insert(key, value.clone());
                return Ok(value);
            }

            if self.required {
                return Err(DocumentStoreError::EmptyRequiredField(key.to_string()));
            }
        }

        let value = document.get(key).cloned().unwrap_or(Bson::Null);

        Ok(match &self.get_callback {
            Some(callback) => callback(value),
            None => value,
        })
    }

    /// Writes `input` under `key`, applying the set-callback and coercion.
    ///
    /// Nothing is stored if the write fails.
    pub(crate) fn write(
        &self,
        key: &str,
        input: FieldInput<'_>,
        document: &mut Document,
    ) -> DocumentStoreResult<()> {
        let value = match &self.reference {
            Some(target) => Self::reference_value(key, target, input)?,
            None => match input {
                FieldInput::Value(value) => value,
                FieldInput::Instance(model) => Bson::Document(model.copy()),
            },
        };

        let value = match &self.set_callback {
            Some(callback) => callback(value),
            None => value,
        };

        let value = match self.field_type {
            Some(field_type) => field_type.coerce(value)?,
            None => value,
        };

        document.insert(key, value);

        Ok(())
    }

    fn reference_value(key: &str, target: &ModelKind, input: FieldInput<'_>) -> DocumentStoreResult<Bson> {
        match input {
            FieldInput::Instance(model) => {
                if model.kind().collection_name() != target.collection_name() {
                    return Err(DocumentStoreError::TypeMismatch(format!(
                        "{key} references {} records, got a {} instance",
                        target.name(),
                        model.kind().name(),
                    )));
                }

                Ok(model.id().cloned().unwrap_or(Bson::Null))
            }
            FieldInput::Value(Bson::Null) => Ok(Bson::Null),
            FieldInput::Value(value) if is_identity(&value) => Ok(value),
            FieldInput::Value(value) => Err(DocumentStoreError::TypeMismatch(format!(
                "{key} references {} records and accepts an identity or an instance, got {value}",
                target.name(),
            ))),
        }
    }
}

impl Default for Field {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("field_type", &self.field_type)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("reference", &self.reference.as_ref().map(|kind| kind.name().to_string()))
            .finish_non_exhaustive()
    }
}

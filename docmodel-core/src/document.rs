//! Helpers for raw documents and identities.
//!
//! Raw documents are plain [`bson::Document`]s. A persisted document carries its
//! identity under [`ID_KEY`]; identities are UUIDs when assigned by this crate's
//! backends, but any scalar identity a store hands back is accepted.

use bson::{Bson, Document, Uuid, spec::BinarySubtype};

/// Key under which every persisted document stores its identity.
pub const ID_KEY: &str = "_id";

/// Generates a fresh identity for a document that has none.
pub fn new_identity() -> Bson {
    Bson::from(Uuid::new())
}

/// Builds the spec matching the document stored under `id`.
pub fn identity_spec(id: Bson) -> Document {
    let mut spec = Document::new();
    spec.insert(ID_KEY, id);
    spec
}

/// Returns `true` if `value` has the shape of a document identity.
///
/// UUID binaries, object ids, strings and integers qualify. Null does not; callers that
/// accept a null identity check for it separately.
pub fn is_identity(value: &Bson) -> bool {
    match value {
        Bson::Binary(binary) => matches!(binary.subtype, BinarySubtype::Uuid | BinarySubtype::UuidOld),
        Bson::ObjectId(_) | Bson::String(_) | Bson::Int32(_) | Bson::Int64(_) => true,
        _ => false,
    }
}

/// Renders an identity or discriminator value for display and registry lookups.
///
/// Strings are rendered without quotes and UUID binaries in their hyphenated form.
pub fn display_value(value: &Bson) -> String {
    match value {
        Bson::String(value) => value.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Binary(binary) if binary.subtype == BinarySubtype::Uuid => binary
            .to_uuid()
            .map(|uuid| uuid.to_string())
            .unwrap_or_else(|_| value.to_string()),
        other => other.to_string(),
    }
}

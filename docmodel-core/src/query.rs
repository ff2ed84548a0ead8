//! Ordering, paging and search helpers passed along with opaque specs.
//!
//! Specs themselves are plain [`bson::Document`]s handed to the backend unchanged. This
//! module only carries what travels next to them: sort entries, limit and skip
//! ([`FindOptions`]), and [`Search`], which turns keyword terms (including model
//! instances) into a spec document.
//!
//! ```ignore
//! use docmodel::query::{FindOptions, SortDirection};
//!
//! let options = FindOptions::builder()
//!     .sort("created_at", SortDirection::Desc)
//!     .limit(10)
//!     .skip(20)
//!     .build();
//! ```

use bson::{Bson, Document};

use crate::{
    document::ID_KEY,
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Returns the store-native representation (`1` or `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

impl TryFrom<i32> for SortDirection {
    type Error = DocumentStoreError;

    fn try_from(value: i32) -> DocumentStoreResult<Self> {
        match value {
            1 => Ok(SortDirection::Asc),
            -1 => Ok(SortDirection::Desc),
            other => Err(DocumentStoreError::TypeMismatch(format!(
                "sort direction must be ascending (1) or descending (-1), got {other}"
            ))),
        }
    }
}

/// A single ordering entry: which field to sort by and in which direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// Ordering and paging controls for a find round-trip.
///
/// `sort` holds the complete ordering to apply; earlier entries take precedence over later ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Ordering entries, most significant first.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return. `Some(0)` means no limit, as in MongoDB.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub skip: Option<usize>,
}

impl FindOptions {
    /// Creates options with no ordering and no paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder for fluent construction.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }

    /// Returns the limit to enforce, reading a zero limit as none.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// Renders the ordering as a store-native sort document (`{field: 1 | -1, ...}`).
    pub fn sort_document(&self) -> Option<Document> {
        if self.sort.is_empty() {
            return None;
        }

        Some(
            self.sort
                .iter()
                .map(|sort| (sort.field.clone(), Bson::Int32(sort.direction.as_i32())))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an ordering entry.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort::new(field, direction));
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Builds and returns the final options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Keyword-style search terms, rendered into an equality spec.
///
/// Model instances are replaced by their identity, so a reference field can be
/// searched with the referenced instance itself.
///
/// ```ignore
/// let staff = person.search(&store, Search::new().instance("company", &company)).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Search {
    spec: Document,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches documents whose `field` equals `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.spec.insert(field.into(), value.into());
        self
    }

    /// Matches documents whose `field` holds the identity of `model`.
    ///
    /// An instance that was never saved matches documents where `field` is null.
    pub fn instance(mut self, field: impl Into<String>, model: &Model) -> Self {
        self.spec.insert(
            field.into(),
            model
                .document()
                .get(ID_KEY)
                .cloned()
                .unwrap_or(Bson::Null),
        );
        self
    }

    /// Returns the spec document built so far.
    pub fn into_spec(self) -> Document {
        self.spec
    }
}

//! Spec evaluation, ordering and modifiers for in-memory documents.
//!
//! This module interprets the subset of the MongoDB query language the in-memory backend
//! supports:
//!
//! - field keys, including dotted paths into embedded documents and arrays
//! - implicit equality, where array fields match if any element is equal
//! - `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`
//! - top-level `$and`, `$or`, `$nor`
//! - modifiers `$set`, `$unset`, `$inc`, or a replacement document

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId, spec::BinarySubtype};

use docmodel_core::{
    document::ID_KEY,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Sort, SortDirection},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(5)` and `Int64(5)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value (also stands in for types that are not comparable)
    Null,
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(&'a str),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Binary payload, UUIDs included
    Binary(BinarySubtype, &'a [u8]),
    ObjectId(ObjectId),
    /// Boolean value
    Bool(bool),
    /// DateTime value
    DateTime(DateTime),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(binary.subtype, &binary.bytes),
            Bson::ObjectId(oid) => Comparable::ObjectId(*oid),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Cross-type rank, following the store's sort order of BSON types.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(..) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// Total order used for sorting: by type rank first, then by value.
    fn total_cmp(&self, other: &Self) -> Ordering {
        match self.partial_cmp(other) {
            Some(ordering) => ordering,
            None => self.rank().cmp(&other.rank()),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(sa, a), Comparable::Binary(sb, b)) => sa == sb && a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Binary(_, a), Comparable::Binary(_, b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a possibly dotted `path` inside `document`.
///
/// Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn is_operator_document(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => !doc.is_empty() && doc.keys().all(|key| key.starts_with('$')),
        _ => false,
    }
}

fn invalid(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(message.into())
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for unsupported operators or
    /// malformed operands.
    pub fn matches(&self, spec: &Document) -> DocumentStoreResult<bool> {
        for (key, value) in spec {
            let matched = match key.as_str() {
                "$and" => self.all_of(Self::clauses(key, value)?)?,
                "$or" => self.any_of(Self::clauses(key, value)?)?,
                "$nor" => !self.any_of(Self::clauses(key, value)?)?,
                operator if operator.starts_with('$') => {
                    return Err(invalid(format!("unsupported top-level operator {operator}")));
                }
                field => self.matches_field(field, value)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents of `documents` that satisfy `spec`.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        spec: &Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(spec)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn clauses<'s>(operator: &str, value: &'s Bson) -> DocumentStoreResult<Vec<&'s Document>> {
        let Bson::Array(items) = value else {
            return Err(invalid(format!("{operator} expects an array of specs")));
        };

        items
            .iter()
            .map(|item| {
                item.as_document()
                    .ok_or_else(|| invalid(format!("{operator} expects an array of specs")))
            })
            .collect()
    }

    fn all_of(&self, clauses: Vec<&Document>) -> DocumentStoreResult<bool> {
        for clause in clauses {
            if !self.matches(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any_of(&self, clauses: Vec<&Document>) -> DocumentStoreResult<bool> {
        for clause in clauses {
            if self.matches(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn matches_field(&self, field: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        let value = lookup(self.document, field);

        let Bson::Document(operators) = condition else {
            return Ok(Self::equals(value, condition));
        };

        if !is_operator_document(condition) {
            return Ok(Self::equals(value, condition));
        }

        for (operator, operand) in operators {
            let matched = match operator.as_str() {
                "$eq" => Self::equals(value, operand),
                "$ne" => !Self::equals(value, operand),
                "$gt" => Self::compares(value, operand, |ordering| ordering == Ordering::Greater),
                "$gte" => Self::compares(value, operand, |ordering| ordering != Ordering::Less),
                "$lt" => Self::compares(value, operand, |ordering| ordering == Ordering::Less),
                "$lte" => Self::compares(value, operand, |ordering| ordering != Ordering::Greater),
                "$in" => Self::one_of(operator, value, operand)?,
                "$nin" => !Self::one_of(operator, value, operand)?,
                "$exists" => {
                    let should_exist = match operand {
                        Bson::Boolean(flag) => *flag,
                        Bson::Int32(n) => *n != 0,
                        Bson::Int64(n) => *n != 0,
                        _ => return Err(invalid("$exists expects a boolean")),
                    };

                    value.is_some() == should_exist
                }
                other => return Err(invalid(format!("unsupported operator {other} on {field}"))),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Equality with array containment; a null operand also matches a missing field.
    fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
        let expected = Comparable::from(operand);

        match value {
            None => expected == Comparable::Null,
            Some(actual) => {
                let actual = Comparable::from(actual);

                if actual == expected {
                    return true;
                }

                match actual {
                    Comparable::Array(items) => items.iter().any(|item| item == &expected),
                    _ => false,
                }
            }
        }
    }

    fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let Some(actual) = value else {
            return false;
        };

        let expected = Comparable::from(operand);

        match Comparable::from(actual) {
            Comparable::Array(items) => items
                .iter()
                .any(|item| item.partial_cmp(&expected).is_some_and(&accept)),
            actual => actual.partial_cmp(&expected).is_some_and(&accept),
        }
    }

    fn one_of(operator: &str, value: Option<&Bson>, operand: &Bson) -> DocumentStoreResult<bool> {
        let Bson::Array(candidates) = operand else {
            return Err(invalid(format!("{operator} expects an array")));
        };

        Ok(candidates.iter().any(|candidate| Self::equals(value, candidate)))
    }
}

/// Sorts `documents` in place by `sort`, earlier entries taking precedence.
///
/// The sort is stable, so documents that compare equal keep their insertion order.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        for entry in sort {
            let left = lookup(a, &entry.field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);
            let right = lookup(b, &entry.field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);

            let ordering = match entry.direction {
                SortDirection::Asc => left.total_cmp(&right),
                SortDirection::Desc => right.total_cmp(&left),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

/// Returns `true` if `a` and `b` are the same identity.
pub(crate) fn same_identity(a: &Bson, b: &Bson) -> bool {
    Comparable::from(a) == Comparable::from(b)
}

/// Applies an update modifier to `document`.
///
/// An operator document (`$set`, `$unset`, `$inc`) edits fields in place; any other
/// document replaces the content while keeping the identity.
pub(crate) fn apply_modifier(document: &mut Document, modifier: &Document) -> DocumentStoreResult<()> {
    let operators = modifier.keys().filter(|key| key.starts_with('$')).count();

    if operators == 0 {
        let mut replacement = Document::new();

        if let Some(id) = document.get(ID_KEY) {
            replacement.insert(ID_KEY, id.clone());
        }

        for (key, value) in modifier {
            if key != ID_KEY {
                replacement.insert(key.clone(), value.clone());
            }
        }

        *document = replacement;
        return Ok(());
    }

    if operators != modifier.len() {
        return Err(invalid("a modifier cannot mix operators and plain fields"));
    }

    let mut updated = document.clone();

    for (operator, fields) in modifier {
        let fields = fields
            .as_document()
            .ok_or_else(|| invalid(format!("{operator} expects a document")))?;

        for (path, value) in fields {
            if path == ID_KEY {
                return Err(invalid("the identity of a document cannot be modified"));
            }

            match operator.as_str() {
                "$set" => set_path(&mut updated, path, value.clone())?,
                "$unset" => unset_path(&mut updated, path),
                "$inc" => {
                    let current = lookup(&updated, path).cloned();
                    let sum = increment(path, current, value)?;
                    set_path(&mut updated, path, sum)?;
                }
                other => return Err(invalid(format!("unsupported modifier {other}"))),
            }
        }
    }

    *document = updated;

    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let entry = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match entry {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(invalid(format!("cannot set {path}: {head} is not a document"))),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

fn increment(path: &str, current: Option<Bson>, by: &Bson) -> DocumentStoreResult<Bson> {
    let current = current.unwrap_or(Bson::Int32(0));

    match (&current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        }),
        (Bson::Int32(a), Bson::Int64(b)) => Ok(Bson::Int64(i64::from(*a) + b)),
        (Bson::Int64(a), Bson::Int32(b)) => Ok(Bson::Int64(a + i64::from(*b))),
        (Bson::Int64(a), Bson::Int64(b)) => Ok(Bson::Int64(a + b)),
        _ => match (numeric(&current), numeric(by)) {
            (Some(a), Some(b)) => Ok(Bson::Double(a + b)),
            _ => Err(invalid(format!("cannot increment {path}: {current} by {by}"))),
        },
    }
}

fn numeric(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, spec: Document) -> bool {
        DocumentEvaluator::new(document).matches(&spec).unwrap()
    }

    #[test]
    fn implicit_equality_and_containment() {
        let document = doc! { "name": "alice", "tags": ["a", "b"], "age": 5 };

        assert!(matches(&document, doc! {}));
        assert!(matches(&document, doc! { "name": "alice" }));
        assert!(matches(&document, doc! { "tags": "b" }));
        assert!(matches(&document, doc! { "age": 5_i64 }));
        assert!(matches(&document, doc! { "missing": Bson::Null }));
        assert!(!matches(&document, doc! { "name": "bob" }));
        assert!(!matches(&document, doc! { "name": "alice", "age": 6 }));
    }

    #[test]
    fn comparison_operators() {
        let document = doc! { "age": 5, "name": "m" };

        assert!(matches(&document, doc! { "age": { "$gt": 3, "$lte": 5 } }));
        assert!(!matches(&document, doc! { "age": { "$lt": 5 } }));
        assert!(matches(&document, doc! { "name": { "$gte": "a" } }));
        assert!(!matches(&document, doc! { "name": { "$gt": 3 } }));
        assert!(matches(&document, doc! { "age": { "$ne": 4 } }));
        assert!(matches(&document, doc! { "age": { "$in": [1, 5] } }));
        assert!(matches(&document, doc! { "age": { "$nin": [1, 2] } }));
        assert!(matches(&document, doc! { "age": { "$exists": true }, "x": { "$exists": false } }));
    }

    #[test]
    fn logical_operators_and_dotted_paths() {
        let document = doc! { "address": { "city": "Oslo" }, "n": [10, 20] };

        assert!(matches(&document, doc! { "address.city": "Oslo" }));
        assert!(matches(&document, doc! { "n.1": 20 }));
        assert!(matches(&document, doc! { "$or": [{ "address.city": "Rome" }, { "n": 10 }] }));
        assert!(!matches(&document, doc! { "$and": [{ "n": 10 }, { "n": 30 }] }));
        assert!(matches(&document, doc! { "$nor": [{ "n": 30 }] }));
    }

    #[test]
    fn unsupported_operators_are_errors() {
        let document = doc! { "a": 1 };

        assert!(DocumentEvaluator::new(&document).matches(&doc! { "a": { "$regex": "x" } }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$where": "x" }).is_err());
        assert!(DocumentEvaluator::new(&document).matches(&doc! { "$or": 1 }).is_err());
    }

    #[test]
    fn multi_key_sort_is_stable() {
        let mut documents = vec![
            doc! { "i": 0, "a": 2, "b": "x" },
            doc! { "i": 1, "a": 1, "b": "y" },
            doc! { "i": 2, "a": 2, "b": "a" },
            doc! { "i": 3, "a": 1, "b": "y" },
        ];

        sort_documents(
            &mut documents,
            &[Sort::new("a", SortDirection::Desc), Sort::new("b", SortDirection::Asc)],
        );

        let order = documents.iter().map(|d| d.get_i32("i").unwrap()).collect::<Vec<_>>();
        assert_eq!(order, vec![2, 0, 1, 3]);
    }

    #[test]
    fn missing_values_sort_first() {
        let mut documents = vec![doc! { "a": 1 }, doc! {}];

        sort_documents(&mut documents, &[Sort::new("a", SortDirection::Asc)]);

        assert_eq!(documents[0], doc! {});
    }

    #[test]
    fn operator_modifiers() {
        let mut document = doc! { "_id": 1, "n": 1, "gone": true };

        apply_modifier(
            &mut document,
            &doc! { "$set": { "name": "x", "nested.value": 2 }, "$unset": { "gone": "" }, "$inc": { "n": 2, "m": 1.5 } },
        )
        .unwrap();

        assert_eq!(
            document,
            doc! { "_id": 1, "n": 3, "name": "x", "nested": { "value": 2 }, "m": 1.5 }
        );
    }

    #[test]
    fn replacement_keeps_identity() {
        let mut document = doc! { "_id": 1, "a": 1 };

        apply_modifier(&mut document, &doc! { "b": 2 }).unwrap();

        assert_eq!(document, doc! { "_id": 1, "b": 2 });
    }

    #[test]
    fn invalid_modifiers_leave_document_untouched() {
        let mut document = doc! { "_id": 1, "a": "text" };

        assert!(apply_modifier(&mut document, &doc! { "$inc": { "a": 1 } }).is_err());
        assert!(apply_modifier(&mut document, &doc! { "$set": { "b": 1 }, "c": 2 }).is_err());
        assert!(apply_modifier(&mut document, &doc! { "$set": { "_id": 2 } }).is_err());
        assert_eq!(document, doc! { "_id": 1, "a": "text" });
    }

    #[test]
    fn identities_compare_across_integer_widths() {
        assert!(same_identity(&Bson::Int32(5), &Bson::Int64(5)));
        assert!(!same_identity(&Bson::String("5".into()), &Bson::Int32(5)));
    }
}

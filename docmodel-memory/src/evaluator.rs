//! Filter and update evaluation for in-memory documents.
//!
//! Filters use the document store's own query dialect: field equality (an array field
//! matches when it contains the value), the comparison operators `$eq`, `$ne`, `$gt`,
//! `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists` and `$not`, and the logical operators
//! `$and`, `$or` and `$nor`. Field names may be dotted paths into embedded documents.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use std::cmp::Ordering;

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    scheme::ID_KEY,
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Fields in stored order; embedded documents are equal only field by field.
    Map(Vec<(&'a str, Comparable<'a>)>),
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
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
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
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Null,
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
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn unsupported(operator: &str) -> DocumentStoreError {
    DocumentStoreError::Backend(format!("unsupported operator {operator}"))
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(key, condition)?,
                "$or" => self.any(key, condition)?,
                "$nor" => !self.any(key, condition)?,
                operator if operator.starts_with('$') => return Err(unsupported(operator)),
                path => self.field_matches(lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn all(&self, key: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        for clause in self.clauses(key, condition)? {
            if !self.matches(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, key: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        for clause in self.clauses(key, condition)? {
            if self.matches(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn clauses<'c>(&self, key: &str, condition: &'c Bson) -> DocumentStoreResult<Vec<&'c Document>> {
        condition
            .as_array()
            .ok_or_else(|| DocumentStoreError::Backend(format!("{key} needs an array of filters")))?
            .iter()
            .map(|clause| {
                clause
                    .as_document()
                    .ok_or_else(|| DocumentStoreError::Backend(format!("{key} needs an array of filters")))
            })
            .collect()
    }

    fn field_matches(&self, value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
        let operators = match condition {
            Bson::Document(operators) if is_operator_document(operators) => operators,
            _ => return Ok(equals(value, condition)),
        };

        for (operator, operand) in operators {
            let matched = match operator.as_str() {
                "$eq" => equals(value, operand),
                "$ne" => !equals(value, operand),
                "$gt" => compare(value, operand, |ordering| ordering == Ordering::Greater),
                "$gte" => compare(value, operand, |ordering| ordering != Ordering::Less),
                "$lt" => compare(value, operand, |ordering| ordering == Ordering::Less),
                "$lte" => compare(value, operand, |ordering| ordering != Ordering::Greater),
                "$in" => contains(value, operator, operand)?,
                "$nin" => !contains(value, operator, operand)?,
                "$exists" => value.is_some() == truthy(operand),
                "$not" => !self.field_matches(value, operand)?,
                operator => return Err(unsupported(operator)),
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

/// Resolves a dotted path into embedded documents and arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(document) => document.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    let Some(value) = value else {
        return matches!(target, Bson::Null);
    };
    let target = Comparable::from(target);

    match value {
        Bson::Array(items) if !matches!(target, Comparable::Array(_)) => items
            .iter()
            .any(|item| Comparable::from(item) == target),
        value => Comparable::from(value) == target,
    }
}

fn compare(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let operand = Comparable::from(operand);
    let check = |item: &Bson| {
        Comparable::from(item)
            .partial_cmp(&operand)
            .is_some_and(&accept)
    };

    match value {
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
        None => false,
    }
}

fn contains(value: Option<&Bson>, operator: &str, operand: &Bson) -> DocumentStoreResult<bool> {
    let candidates = operand
        .as_array()
        .ok_or_else(|| DocumentStoreError::Backend(format!("{operator} needs an array")))?;

    Ok(candidates
        .iter()
        .any(|candidate| equals(value, candidate)))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Null => false,
        _ => true,
    }
}

/// Applies `update` to `document` in place.
///
/// `$set` and `$unset` modify individual (possibly dotted) fields; an update without
/// operators replaces every field except the identifier.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DocumentStoreResult<()> {
    if !is_operator_document(update) {
        let id = document.get(ID_KEY).cloned();
        document.clear();
        if let Some(id) = id {
            document.insert(ID_KEY, id);
        }
        for (key, value) in update {
            if key != ID_KEY {
                document.insert(key.clone(), value.clone());
            }
        }

        return Ok(());
    }

    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| DocumentStoreError::Backend(format!("{operator} needs a document")))?;

        for (path, value) in fields {
            if path == ID_KEY && document.get(ID_KEY) != Some(value) {
                return Err(DocumentStoreError::Backend(format!("field {ID_KEY} is immutable")));
            }

            match operator.as_str() {
                "$set" => set_path(document, path, value.clone())?,
                "$unset" => unset_path(document, path),
                operator => return Err(unsupported(operator)),
            }
        }
    }

    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match child {
                Bson::Document(child) => set_path(child, rest, value),
                _ => Err(DocumentStoreError::Backend(format!("cannot set {rest} inside non-document field {head}"))),
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
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

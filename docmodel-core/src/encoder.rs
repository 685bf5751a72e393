//! Projection and encoding of results for responses.
//!
//! Before a value leaves the system it is projected: record-shaped values are copied field
//! by field in declaration order, leaving out fields marked `#[scheme(hidden)]` and renaming
//! fields to their output names. Every copied field is projected in turn, so hidden fields
//! of nested records and resolved references never leave either. The projected copy is
//! then encoded as JSON, keeping the projected key order.
//!
//! ```ignore
//! use docmodel::encoder::{Encoder, JsonEncoder};
//!
//! let body = JsonEncoder.encode(&[])?;          // b"[]"
//! let body = JsonEncoder.encode(&[&user])?;     // {"id":"…","name":"Alice"}
//! let body = JsonEncoder.encode(&[&a, &b])?;    // [{…},{…}]
//! ```

use bson::{Bson, DateTime, Document, oid::ObjectId, ser::serialize_to_bson};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use crate::{error::DocumentStoreResult, reference::Ref};

/// A value that can be projected before encoding.
pub trait Project {
    /// Returns a copy of the value with hidden fields removed and output names applied.
    fn project(&self) -> DocumentStoreResult<Bson>;
}

/// Encodes values into a response body.
pub trait Encoder {
    /// Encodes zero, one or many values.
    ///
    /// No values encode as an empty sequence, one value encodes unwrapped and several
    /// values encode as a sequence.
    fn encode(&self, values: &[&dyn Project]) -> DocumentStoreResult<Vec<u8>>;
}

/// An [`Encoder`] producing JSON.
///
/// Identifiers are written as 24-character hex strings and datetimes as RFC 3339 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, values: &[&dyn Project]) -> DocumentStoreResult<Vec<u8>> {
        let value = match values {
            [] => Value::Array(Vec::new()),
            [value] => bson_to_json(value.project()?),
            values => Value::Array(
                values
                    .iter()
                    .map(|value| value.project().map(bson_to_json))
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            ),
        };

        Ok(serde_json::to_vec(&value)?)
    }
}

/// Converts a projected value to JSON.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(value) => Value::Bool(value),
        Bson::Int32(value) => Value::Number(value.into()),
        Bson::Int64(value) => Value::Number(value.into()),
        Bson::Double(value) => Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(value) => Value::String(value),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(datetime) => Value::String(datetime.to_chrono().to_rfc3339()),
        Bson::Array(items) => Value::Array(
            items
                .into_iter()
                .map(bson_to_json)
                .collect(),
        ),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect::<Map<_, _>>(),
        ),
        other => Value::String(other.to_string()),
    }
}

/// Projects a value through its `Serialize` impl, unchanged.
///
/// Used for fields marked `#[scheme(serialized)]`.
pub fn project_serialized<T: Serialize + ?Sized>(value: &T) -> DocumentStoreResult<Bson> {
    Ok(serialize_to_bson(value)?)
}

macro_rules! impl_project_passthrough {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Project for $ty {
                fn project(&self) -> DocumentStoreResult<Bson> {
                    project_serialized(self)
                }
            }
        )*
    };
}

impl_project_passthrough!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, char, str, String,
    ObjectId, DateTime, Bson, Document, Value,
);

impl<T: Project + ?Sized> Project for &T {
    fn project(&self) -> DocumentStoreResult<Bson> {
        (**self).project()
    }
}

impl<T: Project + ?Sized> Project for Box<T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        (**self).project()
    }
}

impl<T: Project + ?Sized> Project for Arc<T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        (**self).project()
    }
}

impl<T: Project> Project for Option<T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        match self {
            Some(value) => value.project(),
            None => Ok(Bson::Null),
        }
    }
}

impl<T: Project> Project for Vec<T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        self.as_slice().project()
    }
}

impl<T: Project> Project for [T] {
    fn project(&self) -> DocumentStoreResult<Bson> {
        Ok(Bson::Array(
            self.iter()
                .map(Project::project)
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        ))
    }
}

impl<T: Project> Project for HashMap<String, T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        let mut document = Document::new();
        for (key, value) in self {
            document.insert(key.clone(), value.project()?);
        }

        Ok(Bson::Document(document))
    }
}

impl<T: Project> Project for BTreeMap<String, T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        let mut document = Document::new();
        for (key, value) in self {
            document.insert(key.clone(), value.project()?);
        }

        Ok(Bson::Document(document))
    }
}

impl<T: Project> Project for Ref<T> {
    fn project(&self) -> DocumentStoreResult<Bson> {
        match self {
            Ref::Unresolved(id) => Ok(Bson::ObjectId(*id)),
            Ref::Resolved(document) => document.project(),
        }
    }
}

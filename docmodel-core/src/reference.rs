//! Reference fields that hold either an identifier or the document it points to.
//!
//! A stored reference is a bare [`ObjectId`]. After
//! [`Model::expand`](crate::model::Model::expand) the field holds the related document,
//! but it is still stored as the identifier; only projection reaches the document.

use bson::{Bson, Document, de::deserialize_from_bson, oid::ObjectId};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _, ser::Error as _};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    scheme::Scheme,
};

/// A reference to a document of scheme `T`.
///
/// Always serialized as the identifier of the related document, resolved or not.
/// Deserializes from an ObjectId, a 24-character hex string, or an embedded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref<T> {
    /// Only the identifier of the related document is known.
    Unresolved(ObjectId),
    /// The related document has been loaded.
    Resolved(Box<T>),
}

impl<T> Ref<T> {
    /// Creates an unresolved reference.
    pub fn new(id: ObjectId) -> Self {
        Ref::Unresolved(id)
    }

    /// Returns `true` once the related document has been loaded.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Ref::Resolved(_))
    }

    /// Returns the related document, if loaded.
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Ref::Resolved(document) => Some(document),
            Ref::Unresolved(_) => None,
        }
    }
}

impl<T: Scheme> Ref<T> {
    /// Returns the identifier of the related document.
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Ref::Unresolved(id) => Some(*id),
            Ref::Resolved(document) => document.id().copied(),
        }
    }
}

impl<T> Default for Ref<T> {
    fn default() -> Self {
        Ref::Unresolved(ObjectId::from_bytes([0; 12]))
    }
}

impl<T> From<ObjectId> for Ref<T> {
    fn from(id: ObjectId) -> Self {
        Ref::Unresolved(id)
    }
}

impl<T: Scheme> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.id() {
            Some(id) => id.serialize(serializer),
            None => Err(S::Error::custom("resolved reference has no identifier")),
        }
    }
}

impl<'de, T: serde::de::DeserializeOwned> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Bson::deserialize(deserializer)? {
            Bson::ObjectId(id) => Ok(Ref::Unresolved(id)),
            Bson::String(hex) => ObjectId::parse_str(&hex)
                .map(Ref::Unresolved)
                .map_err(|_| D::Error::custom(format!("invalid reference identifier: {hex}"))),
            other => deserialize_from_bson::<T>(other)
                .map(|document| Ref::Resolved(Box::new(document)))
                .map_err(D::Error::custom),
        }
    }
}

/// Type-erased access to a reference field, used by relation expansion.
pub trait ReferenceSlot: Send {
    /// Returns the identifier held by the reference.
    fn target_id(&self) -> Option<ObjectId>;

    /// Returns `true` once the related document has been loaded.
    fn is_resolved(&self) -> bool;

    /// Returns the collection the related document lives in.
    fn target_collection(&self) -> String;

    /// Replaces the reference with the decoded related document.
    fn resolve(&mut self, document: Document) -> DocumentStoreResult<()>;
}

impl<T: Scheme> ReferenceSlot for Ref<T> {
    fn target_id(&self) -> Option<ObjectId> {
        self.id()
    }

    fn is_resolved(&self) -> bool {
        Ref::is_resolved(self)
    }

    fn target_collection(&self) -> String {
        T::collection_name()
    }

    fn resolve(&mut self, document: Document) -> DocumentStoreResult<()> {
        let resolved = deserialize_from_bson::<T>(Bson::Document(document))
            .map_err(|e| DocumentStoreError::Decode(e.to_string()))?;
        *self = Ref::Resolved(Box::new(resolved));

        Ok(())
    }
}

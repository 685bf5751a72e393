//! Selector normalization.
//!
//! A [`Selector`] describes which documents a query matches. It is canonicalized into a
//! filter whose display form is used as the query cache key.

use bson::{Bson, Document, doc, oid::ObjectId};

use crate::scheme::ID_KEY;

/// Length of the hexadecimal text form of an identifier.
pub const IDENTIFIER_HEX_LEN: usize = 24;

/// Input describing which documents a query should match.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every document in the collection.
    All,
    /// The document with the given identifier.
    Id(ObjectId),
    /// Any document whose identifier is in the set.
    Ids(Vec<ObjectId>),
    /// A string: an identifier if it is 24 hex characters, a raw filter value otherwise.
    Text(String),
    /// A raw filter document passed to the store unchanged.
    Filter(Document),
}

impl Selector {
    /// Normalizes the selector into the filter sent to the store.
    pub fn into_filter(self) -> Bson {
        match self {
            Selector::All => Bson::Document(Document::new()),
            Selector::Id(id) => Bson::Document(doc! { ID_KEY: id }),
            Selector::Ids(ids) => Bson::Document(doc! { ID_KEY: { "$in": ids } }),
            Selector::Text(text) => match parse_identifier(&text) {
                Some(id) => Bson::Document(doc! { ID_KEY: id }),
                None => Bson::String(text),
            },
            Selector::Filter(filter) => Bson::Document(filter),
        }
    }
}

/// Parses a string as an identifier if it has exactly the identifier's hex shape.
pub fn parse_identifier(text: &str) -> Option<ObjectId> {
    if text.len() != IDENTIFIER_HEX_LEN || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    ObjectId::parse_str(text).ok()
}

/// Returns the canonical textual form of a filter.
pub fn canonical_key(filter: &Bson) -> String {
    filter.to_string()
}

impl From<ObjectId> for Selector {
    fn from(id: ObjectId) -> Self {
        Selector::Id(id)
    }
}

impl From<&ObjectId> for Selector {
    fn from(id: &ObjectId) -> Self {
        Selector::Id(*id)
    }
}

impl From<Vec<ObjectId>> for Selector {
    fn from(ids: Vec<ObjectId>) -> Self {
        Selector::Ids(ids)
    }
}

impl From<&[ObjectId]> for Selector {
    fn from(ids: &[ObjectId]) -> Self {
        Selector::Ids(ids.to_vec())
    }
}

impl From<String> for Selector {
    fn from(text: String) -> Self {
        Selector::Text(text)
    }
}

impl From<&str> for Selector {
    fn from(text: &str) -> Self {
        Selector::Text(text.to_string())
    }
}

impl From<Document> for Selector {
    fn from(filter: Document) -> Self {
        Selector::Filter(filter)
    }
}

impl<T: Into<Selector>> From<Option<T>> for Selector {
    fn from(selector: Option<T>) -> Self {
        selector.map_or(Selector::All, Into::into)
    }
}

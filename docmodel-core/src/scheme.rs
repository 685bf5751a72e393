//! Scheme descriptors and their static field tables.
//!
//! A [`Scheme`] is an application-defined record shape stored in its own collection.
//! A [`Record`] is any record-shaped type with a field table, including structures
//! embedded inside a scheme. Both are normally implemented with the derive macros:
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
//! pub struct Address {
//!     pub city: String,
//!     #[scheme(hidden)]
//!     pub geohash: String,
//! }
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Scheme)]
//! pub struct UserScheme {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     pub name: String,
//!     #[scheme(hidden)]
//!     pub password: String,
//!     #[scheme(nested)]
//!     pub address: Option<Address>,
//! }
//!
//! assert_eq!(UserScheme::collection_name(), "Users");
//! ```

use bson::oid::ObjectId;
use serde::{Serialize, de::DeserializeOwned};

use crate::reference::ReferenceSlot;

/// Storage key of the identifier in every stored document.
pub const ID_KEY: &str = "_id";

/// Function returning the field table of a record type.
pub type FieldTable = fn() -> &'static [FieldDescriptor];

/// What a declared field holds, as far as expansion and introspection are concerned.
#[derive(Clone, Copy)]
pub enum FieldKind {
    /// A value that is copied as-is.
    Plain,
    /// The document identifier.
    Identifier,
    /// A record-shaped value (or a sequence or option of one), described by its own table.
    Nested(FieldTable),
    /// A [`Ref`](crate::reference::Ref) to a document of another scheme.
    Reference(FieldTable),
}

impl std::fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Plain => f.write_str("Plain"),
            FieldKind::Identifier => f.write_str("Identifier"),
            FieldKind::Nested(_) => f.write_str("Nested"),
            FieldKind::Reference(_) => f.write_str("Reference"),
        }
    }
}

/// Static description of one declared field of a record.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// The declared Rust field name.
    pub name: &'static str,
    /// The key the field is stored under.
    pub key: &'static str,
    /// The name the field is exposed under by the encoder and looked up by in expansion.
    pub output: &'static str,
    /// Whether the field is excluded from encoded output.
    pub hidden: bool,
    /// What the field holds.
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Returns `true` when the field holds a reference to another scheme.
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference(_))
    }

    /// Returns `true` when the field is the document identifier.
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, FieldKind::Identifier)
    }
}

/// A record-shaped type with a static field table.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the declared fields in declaration order.
    fn fields() -> &'static [FieldDescriptor];

    /// Returns the reference slot for a declared field name, if the field is a reference.
    fn reference_mut(&mut self, _field: &str) -> Option<&mut dyn ReferenceSlot> {
        None
    }

    /// Looks a field up by its output name.
    fn field_by_output(output: &str) -> Option<&'static FieldDescriptor> {
        Self::fields()
            .iter()
            .find(|field| field.output == output)
    }
}

/// A record type stored in its own collection.
pub trait Scheme: Record {
    /// Returns the type name the collection name is derived from.
    fn scheme_name() -> &'static str;

    /// Returns the name of the collection this scheme is stored in.
    fn collection_name() -> String {
        collection_name(Self::scheme_name())
    }

    /// Returns the document identifier, if the scheme declares one.
    fn id(&self) -> Option<&ObjectId>;

    /// Returns the identifier field for assignment, if the scheme declares one.
    fn id_mut(&mut self) -> Option<&mut ObjectId>;

    /// Returns the descriptor of the identifier field.
    fn identifier_field() -> Option<&'static FieldDescriptor> {
        Self::fields()
            .iter()
            .find(|field| field.is_identifier())
    }
}

/// Derives a collection name from a scheme name.
///
/// The trailing `Scheme` suffix is stripped, the first letter is upper-cased and an `s`
/// is appended: `UserScheme` becomes `Users`, `post` becomes `Posts`.
pub fn collection_name(scheme_name: &str) -> String {
    let base = scheme_name
        .strip_suffix("Scheme")
        .unwrap_or(scheme_name);
    let mut chars = base.chars();

    let mut name = match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars)
            .collect::<String>(),
        None => String::new(),
    };
    name.push('s');

    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_strips_suffix_and_pluralizes() {
        assert_eq!(collection_name("UserScheme"), "Users");
        assert_eq!(collection_name("PhoneScheme"), "Phones");
        assert_eq!(collection_name("Post"), "Posts");
    }

    #[test]
    fn collection_name_title_cases() {
        assert_eq!(collection_name("comment"), "Comments");
        assert_eq!(collection_name("orderLineScheme"), "OrderLines");
    }

    #[test]
    fn collection_name_only_strips_trailing_suffix() {
        assert_eq!(collection_name("SchemeRegistry"), "SchemeRegistrys");
        assert_eq!(collection_name("Scheme"), "s");
    }
}

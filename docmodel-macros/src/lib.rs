//! Procedural macros for the docmodel project.
//!
//! This crate provides two derive macros:
//! - `#[derive(Record)]` - Field table and projection for record-shaped types
//! - `#[derive(Scheme)]` - Everything `Record` generates plus the scheme descriptor

use proc_macro::TokenStream;

mod record;

/// Derive macro for record-shaped types embedded in schemes.
///
/// Generates `Record` (the static field table and reference slots) and `Project`.
/// The type must also derive `Serialize` and `Deserialize`; `#[serde(rename)]` and
/// `#[serde(skip)]` are honored when building the field table.
///
/// The generated `Project` projects every visible field through its own `Project` impl,
/// so nested records are filtered whether or not they are marked `nested`. A field type
/// without a `Project` impl fails to compile unless marked `#[scheme(serialized)]`.
///
/// # Attributes
///
/// - `#[scheme(hidden)]` - Leave the field out of encoded output
/// - `#[scheme(output = "...")]` - Name the field is encoded under and expanded by
/// - `#[scheme(nested)]` - Record the nested field table of a `Record` field (or a `Vec`,
///   `Option` or `Box` of one) in the descriptor
/// - `#[scheme(reference)]` - The field holds a `Ref<T>`; detected automatically for `Ref` types
/// - `#[scheme(serialized)]` - Project the field through its `Serialize` impl, as-is
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Serialize, Deserialize, Record)]
/// pub struct Address {
///     pub city: String,
///     #[scheme(hidden)]
///     pub geohash: String,
/// }
/// ```
#[proc_macro_derive(Record, attributes(scheme))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_impl(input, false)
}

/// Derive macro for schemes stored in their own collection.
///
/// Generates `Record`, `Project` and `Scheme`. The identifier is the field named `id`
/// or marked `#[scheme(id)]`; it must be an `ObjectId` stored under `_id`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Serialize, Deserialize, Scheme)]
/// pub struct PostScheme {
///     #[serde(rename = "_id")]
///     pub id: ObjectId,
///     pub title: String,
///     pub author: Ref<UserScheme>,
/// }
/// ```
#[proc_macro_derive(Scheme, attributes(scheme))]
pub fn derive_scheme(input: TokenStream) -> TokenStream {
    record::derive_impl(input, true)
}

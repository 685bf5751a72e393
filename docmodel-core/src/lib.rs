//! A generic model layer for JSON document stores.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Schemes** ([`scheme`]) - Record descriptors, field tables and collection naming
//! - **Selectors** ([`selector`]) - Normalization of identifiers, identifier lists and filters
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Models** ([`model`]) - Typed create, update and delete against one collection
//! - **Queries** ([`query`]) - Cached bound queries with paging and lazy materialization
//! - **References** ([`reference`]) and **expansion** ([`expand`]) - Resolving related documents
//! - **Encoding** ([`encoder`]) - Projection of results for responses
//! - **Connections** ([`link`]) - Named connection configuration and session reuse
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Scheme)]
//! pub struct PersonScheme {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     pub name: String,
//! }
//!
//! let people = Model::<PersonScheme, _>::new(InMemoryStore::new());
//! assert_eq!(people.collection(), "Persons");
//! ```

pub mod backend;
pub mod encoder;
pub mod error;
pub mod expand;
pub mod link;
mod materialize;
pub mod model;
pub mod query;
pub mod reference;
pub mod scheme;
pub mod selector;

//! Main docmodel crate providing a generic model layer over JSON document stores.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types, the derive macros and the storage backends.
//!
//! # Features
//!
//! - **Schemes** - Derive a field table, collection name and identifier accessors
//! - **Cached queries** - Identical selectors share one bound query per model
//! - **Typed mutations** - Create, update and delete return documents as stored
//! - **Relation expansion** - Resolve reference fields across a result set
//! - **Projection encoding** - Hidden fields never reach the encoded output
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Scheme)]
//! pub struct UserScheme {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     pub name: String,
//!     #[scheme(hidden)]
//!     pub password: String,
//! }
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Scheme)]
//! pub struct PostScheme {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     pub title: String,
//!     pub author: Ref<UserScheme>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = InMemoryStore::new();
//!     let users = Model::<UserScheme, _>::new(store.clone());
//!     let posts = Model::<PostScheme, _>::new(store);
//!
//!     let alice = users.create_fields(doc! { "name": "Alice", "password": "s3cret" }).await?;
//!     posts.create_fields(doc! { "title": "Hello", "author": alice.id }).await?;
//!
//!     let mut all = posts.find_all().all().await?;
//!     posts.expand(all.iter_mut(), "author").await;
//!
//!     // The password of the expanded author is not encoded.
//!     let refs = all.iter().map(|post| post as &dyn Project).collect::<Vec<_>>();
//!     let body = JsonEncoder.encode(&refs)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Connections
//!
//! Named connections are resolved through a [`link::Linker`], which opens each session
//! once and reuses it:
//!
//! ```ignore
//! use docmodel::{link::{LinkConfig, Linker}, memory::InMemoryConnector};
//!
//! let linker = Linker::new(LinkConfig::from_path("links.json")?, InMemoryConnector::new());
//! let users = linker.model::<UserScheme>(None).await?;
//! let audit = linker.model::<AuditScheme>(Some("audit")).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmodel;

pub mod prelude;

pub use docmodel_core::{backend, encoder, error, expand, link, model, query, reference, scheme, selector};
pub use docmodel_macros::{Record, Scheme};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryConnector, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbConnector, MongoDbStore, MongoDbStoreBuilder};
}

//! MongoDB backend implementation for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters and updates are passed to the server unchanged, so models can use the full
//! MongoDB query language.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, mongodb::MongoDbStore, prelude::*};
//!
//! let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!     .build()
//!     .await?;
//! let users = Model::<UserScheme, _>::new(store);
//! ```
//!
//! With a connection configuration, [`MongoDbConnector`] opens one session per named link:
//!
//! ```ignore
//! use docmodel::{link::{LinkConfig, Linker}, mongodb::MongoDbConnector};
//!
//! let linker = Linker::new(LinkConfig::from_path("links.json")?, MongoDbConnector);
//! let users = linker.model::<UserScheme>(None).await?;
//! ```

pub mod store;

pub use store::{MongoDbConnector, MongoDbStore, MongoDbStoreBuilder};

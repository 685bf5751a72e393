//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Store query dialect** - Evaluates equality, comparison and logical filter operators
//! - **Insertion order** - Cursors yield documents in the order they were inserted
//! - **Named sessions** - [`InMemoryConnector`] backs connection configurations
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let users = Model::<UserScheme, _>::new(InMemoryStore::new());
//! let alice = users.create_fields(doc! { "name": "Alice" }).await?;
//! ```

pub mod evaluator;
pub mod store;

pub use store::{InMemoryConnector, InMemoryStore, InMemoryStoreBuilder};

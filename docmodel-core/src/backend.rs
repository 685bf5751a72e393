//! Document store client abstraction.
//!
//! This module defines the traits that abstract over the storage backend a model talks to.
//! Filters and updates are BSON documents in the store's own query dialect; results come
//! back as a stream of raw documents that the model decodes into schemes.
//!
//! # Traits
//!
//! - [`StoreBackend`]: find, insert, find-and-modify and bulk removal against a database
//! - [`StoreBackendBuilder`]: factory for creating a backend from explicit parameters
//! - [`Connector`]: factory for creating a backend from a named [`Link`]
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::{StoreBackend, FindOptions};
//! use bson::{doc, oid::ObjectId};
//! use futures::TryStreamExt;
//!
//! let id = ObjectId::new();
//! backend.insert("Users", doc! { "_id": id, "name": "Alice" }).await?;
//!
//! let found = backend
//!     .find("Users", doc! { "_id": id }, FindOptions::default())
//!     .await?
//!     .try_collect::<Vec<_>>()
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::{fmt::Debug, sync::Arc};

use crate::{error::DocumentStoreResult, link::Link};

/// A stream of raw documents produced by a find operation, in store order.
pub type DocumentCursor = BoxStream<'static, DocumentStoreResult<Document>>;

/// Paging options for a find operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Number of matching documents to skip.
    pub skip: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

/// Abstract interface for document store clients.
///
/// Implementers provide the storage operations the model layer is built on. Every call is
/// a single round trip with no retries; errors are returned to the caller as they occur.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a model can be shared across async tasks.
///
/// # Cancellation
///
/// All methods are async; dropping the returned future abandons the operation.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Opens a cursor over the documents of `collection` matching `filter`.
    ///
    /// Documents are yielded in the store's natural order after `options` are applied.
    /// A missing collection yields an empty cursor.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor>;

    /// Inserts a document that already carries its `_id`.
    ///
    /// The collection is created if it does not exist. Inserting an `_id` that is
    /// already present is an error.
    async fn insert(&self, collection: &str, document: Document) -> DocumentStoreResult<()>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// Returns the document as it is after the update, or `None` if nothing matched.
    async fn find_and_modify(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Removes every document matching `filter` and returns how many were removed.
    async fn remove_all(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        (**self)
            .find(collection, filter, options)
            .await
    }

    async fn insert(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        (**self)
            .insert(collection, document)
            .await
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self)
            .find_and_modify(collection, filter, update)
            .await
    }

    async fn remove_all(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self)
            .remove_all(collection, filter)
            .await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        (**self)
            .find(collection, filter, options)
            .await
    }

    async fn insert(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        (**self)
            .insert(collection, document)
            .await
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self)
            .find_and_modify(collection, filter, update)
            .await
    }

    async fn remove_all(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self)
            .remove_all(collection, filter)
            .await
    }
}

/// Factory trait for creating backend instances from explicit parameters.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

/// Factory trait for opening a backend session from a named connection configuration.
///
/// The returned backend is bound to the database named by [`Link::db_name`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Backend: StoreBackend + 'static;

    async fn connect(&self, link: &Link) -> DocumentStoreResult<Self::Backend>;
}

//! Query construction, caching and result materialization.
//!
//! [`Model::find`](crate::model::Model::find) normalizes a selector, binds it through the
//! model's [`QueryCache`] and returns a [`Query`] handle. Paging is set on the handle and
//! the store cursor is opened only when the handle is consumed:
//!
//! ```ignore
//! let page = model
//!     .find(doc! { "active": true })
//!     .skip(20)
//!     .limit(10)
//!     .all()
//!     .await?;
//! ```

use bson::{Bson, Document, de::deserialize_from_bson};
use futures::StreamExt;
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, warn};

use crate::{
    backend::{FindOptions, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
    materialize::drain,
    model::{Model, filter_document},
    scheme::{Record, Scheme},
    selector::canonical_key,
};

/// Page size used when a query is given a limit of zero.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A canonical filter bound to a model. Immutable once cached.
#[derive(Debug, PartialEq)]
pub struct BoundQuery {
    key: String,
    filter: Bson,
}

impl BoundQuery {
    /// Returns the canonical textual form of the filter.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the canonical filter.
    pub fn filter(&self) -> &Bson {
        &self.filter
    }
}

/// Memoizes bound queries by canonical filter.
///
/// Owned by one model and shared by every task using it.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<HashMap<String, Arc<BoundQuery>>>,
}

impl QueryCache {
    /// Returns the cached bound query for `filter`, binding a new one on a miss.
    pub fn bind(&self, filter: Bson) -> Arc<BoundQuery> {
        let key = canonical_key(&filter);

        self.entries
            .lock()
            .entry(key)
            .or_insert_with_key(|key| {
                debug!(filter = %key, "binding query");
                Arc::new(BoundQuery { key: key.clone(), filter })
            })
            .clone()
    }

    /// Returns the number of cached queries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every cached query.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}

/// A bound query with paging, consumed by [`Query::one`], [`Query::all`],
/// [`Query::all_into`] or [`Query::documents`].
pub struct Query<'m, S: Scheme, B: StoreBackend> {
    model: &'m Model<S, B>,
    bound: Arc<BoundQuery>,
    options: FindOptions,
}

impl<'m, S: Scheme, B: StoreBackend> fmt::Debug for Query<'m, S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("collection", &self.model.collection)
            .field("filter", &self.bound.key)
            .field("options", &self.options)
            .finish()
    }
}

impl<'m, S: Scheme, B: StoreBackend> Query<'m, S, B> {
    pub(crate) fn new(model: &'m Model<S, B>, bound: Arc<BoundQuery>) -> Self {
        Self {
            model,
            bound,
            options: FindOptions::default(),
        }
    }

    /// Returns the cached bound query this handle was built from.
    pub fn bound(&self) -> &Arc<BoundQuery> {
        &self.bound
    }

    /// Returns the canonical filter.
    pub fn filter(&self) -> &Bson {
        &self.bound.filter
    }

    /// Returns the paging options.
    pub fn options(&self) -> FindOptions {
        self.options
    }

    /// Skips the first `n` matching documents.
    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = Some(n);
        self
    }

    /// Returns at most `n` documents; `0` means [`DEFAULT_PAGE_SIZE`].
    pub fn limit(mut self, n: usize) -> Self {
        self.options.limit = Some(if n == 0 { DEFAULT_PAGE_SIZE } else { n });
        self
    }

    /// Returns the first matching document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if nothing matches and
    /// [`DocumentStoreError::Decode`] if the stored document does not fit the scheme.
    pub async fn one(self) -> DocumentStoreResult<S> {
        let model = self.model;
        let key = &self.bound.key;
        let filter = filter_document(self.bound.filter.clone())?;
        let options = FindOptions {
            limit: Some(1),
            ..self.options
        };

        let first = model
            .guard("find", async {
                model.backend
                    .find(&model.collection, filter, options)
                    .await?
                    .next()
                    .await
                    .transpose()
            })
            .await
            .map_err(|e| {
                warn!(collection = %model.collection, filter = %key, error = %e, "query error");
                e
            })?;

        match first {
            Some(document) => decode::<S>(document).map_err(|e| {
                warn!(collection = %model.collection, filter = %key, error = %e, "unable to decode document");
                e
            }),
            None => {
                debug!(collection = %model.collection, filter = %key, "no document found");
                Err(DocumentStoreError::NotFound(model.collection.clone(), key.clone()))
            }
        }
    }

    /// Returns every matching document, in cursor order.
    ///
    /// An error while iterating stops materialization; the documents read before it are
    /// returned. Failing to open the cursor is an error.
    pub async fn all(self) -> DocumentStoreResult<Vec<S>> {
        let mut documents = Vec::new();
        self.all_into(&mut documents).await?;

        Ok(documents)
    }

    /// Like [`Query::all`], filling `dest` instead of allocating a new vector.
    ///
    /// `dest` is cleared first and its capacity reused. Returns the number of documents read.
    pub async fn all_into(self, dest: &mut Vec<S>) -> DocumentStoreResult<usize> {
        self.materialize(dest, decode::<S>).await
    }

    /// Returns every matching document undecoded.
    pub async fn documents(self) -> DocumentStoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        self.materialize(&mut documents, Ok).await?;

        Ok(documents)
    }

    async fn materialize<T, F>(self, dest: &mut Vec<T>, decode: F) -> DocumentStoreResult<usize>
    where
        F: FnMut(Document) -> DocumentStoreResult<T>,
    {
        let model = self.model;
        let key = &self.bound.key;
        let filter = filter_document(self.bound.filter.clone())?;
        let options = self.options;

        model
            .guard("find", async {
                let cursor = model.backend
                    .find(&model.collection, filter, options)
                    .await?;

                Ok(drain(cursor, dest, decode, &model.collection).await)
            })
            .await
            .map_err(|e| {
                warn!(collection = %model.collection, filter = %key, error = %e, "query error");
                e
            })
    }
}

/// Decodes a stored document into a record.
pub(crate) fn decode<R: Record>(document: Document) -> DocumentStoreResult<R> {
    deserialize_from_bson(Bson::Document(document))
        .map_err(|e| DocumentStoreError::Decode(e.to_string()))
}

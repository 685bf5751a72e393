//! The generic model layer.
//!
//! A [`Model`] binds a [`Scheme`] to a collection on a [`StoreBackend`]. It builds queries
//! through [`Model::find`], expands references through [`Model::expand`] and writes through
//! [`Model::create`], [`Model::update`] and [`Model::delete`].
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let model = Model::<UserScheme, _>::new(InMemoryStore::new());
//!
//! let alice = model.create_fields(doc! { "name": "Alice" }).await?;
//! let same = model.find(alice.id).one().await?;
//! let bob = model.update(alice.id, doc! { "name": "Bob" }).await?;
//!
//! assert!(model.delete(bob.id).await?);
//! assert!(model.find(bob.id).one().await.unwrap_err().is_not_found());
//! ```

use bson::{Bson, Document, doc, oid::ObjectId, ser::serialize_to_bson};
use std::{fmt, future::Future, marker::PhantomData, time::Duration};
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Query, QueryCache},
    scheme::{ID_KEY, Scheme},
    selector::{Selector, canonical_key},
};

/// What happens to cached queries when the model writes.
///
/// Cached entries hold only the canonical filter, never results: every consumption of a
/// query reads from the store, so reads after a write observe the write under either policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cached queries live as long as the model.
    #[default]
    Retain,
    /// Create, update and delete empty the cache.
    ClearOnWrite,
}

/// Input to [`Model::create`].
#[derive(Debug, Clone)]
pub enum Payload<S> {
    /// No payload; always rejected.
    Empty,
    /// A field map. The identifier is injected under `_id`.
    Fields(Document),
    /// A typed record. The identifier is written into its identifier field.
    Record(S),
}

impl<S> From<Document> for Payload<S> {
    fn from(fields: Document) -> Self {
        Payload::Fields(fields)
    }
}

impl<S> From<Option<Document>> for Payload<S> {
    fn from(fields: Option<Document>) -> Self {
        fields.map_or(Payload::Empty, Payload::Fields)
    }
}

/// A scheme bound to a collection on a backend.
pub struct Model<S: Scheme, B: StoreBackend> {
    pub(crate) backend: B,
    pub(crate) collection: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cache_policy: CachePolicy,
    pub(crate) cache: QueryCache,
    _scheme: PhantomData<fn() -> S>,
}

impl<S: Scheme, B: StoreBackend> fmt::Debug for Model<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("scheme", &S::scheme_name())
            .field("collection", &self.collection)
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .field("cache_policy", &self.cache_policy)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<S: Scheme, B: StoreBackend> Model<S, B> {
    /// Creates a model with the default collection name and no deadline.
    pub fn new(backend: B) -> Self {
        ModelBuilder::new(backend).build()
    }

    /// Creates a builder for a model with custom options.
    pub fn builder(backend: B) -> ModelBuilder<S, B> {
        ModelBuilder::new(backend)
    }

    /// Returns the name of the collection this model reads and writes.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the backend this model talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the number of distinct queries currently cached.
    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// Drops every cached query.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Builds a query for the documents matching `selector`.
    ///
    /// Identical canonical selectors share one cached bound query. No store call is made
    /// until the query is consumed.
    pub fn find(&self, selector: impl Into<Selector>) -> Query<'_, S, B> {
        Query::new(self, self.cache.bind(selector.into().into_filter()))
    }

    /// Builds a query matching every document of the collection.
    pub fn find_all(&self) -> Query<'_, S, B> {
        self.find(Selector::All)
    }

    /// Inserts a new document and returns it as stored.
    ///
    /// A fresh identifier is generated and injected into the payload. The returned
    /// document is read back from the store, so it reflects anything the store applied.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] for an empty payload, for a record whose
    /// scheme declares no identifier field, or for a record that does not serialize to a
    /// document. Store errors are propagated.
    pub async fn create(&self, payload: Payload<S>) -> DocumentStoreResult<S> {
        let id = ObjectId::new();

        let document = match payload {
            Payload::Empty => {
                warn!(collection = %self.collection, "create payload is empty");
                return Err(DocumentStoreError::Validation("create payload is empty".into()));
            }
            Payload::Fields(mut fields) => {
                if let Some(previous) = fields.insert(ID_KEY, id) {
                    debug!(collection = %self.collection, %previous, "replacing caller supplied identifier");
                }
                fields
            }
            Payload::Record(mut record) => {
                let slot = match (S::identifier_field(), record.id_mut()) {
                    (Some(_), Some(slot)) => slot,
                    _ => {
                        warn!(scheme = S::scheme_name(), "scheme has no identifier field");
                        return Err(DocumentStoreError::Validation(format!(
                            "scheme {} has no identifier field",
                            S::scheme_name()
                        )));
                    }
                };
                *slot = id;

                match serialize_to_bson(&record)? {
                    Bson::Document(document) => document,
                    other => {
                        warn!(scheme = S::scheme_name(), kind = ?other.element_type(), "unsupported payload shape");
                        return Err(DocumentStoreError::Validation(format!(
                            "unsupported payload shape {:?} for scheme {}",
                            other.element_type(),
                            S::scheme_name()
                        )));
                    }
                }
            }
        };

        self.guard("insert", self.backend.insert(&self.collection, document))
            .await
            .map_err(|e| {
                warn!(collection = %self.collection, %id, error = %e, "unable to insert");
                e
            })?;
        self.after_write();
        debug!(collection = %self.collection, %id, "created");

        self.find(id).one().await
    }

    /// Inserts a field map. See [`Model::create`].
    pub async fn create_fields(&self, fields: Document) -> DocumentStoreResult<S> {
        self.create(Payload::Fields(fields)).await
    }

    /// Inserts a typed record. See [`Model::create`].
    pub async fn create_record(&self, record: S) -> DocumentStoreResult<S> {
        self.create(Payload::Record(record)).await
    }

    /// Sets `fields` on the first document matching `selector` and returns it as stored.
    ///
    /// The update is a single find-and-modify round trip followed by a read of the
    /// modified document by its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`] if `fields` is empty or touches the
    /// identifier, [`DocumentStoreError::NotFound`] if nothing matches. Store errors are
    /// propagated.
    pub async fn update(&self, selector: impl Into<Selector>, fields: Document) -> DocumentStoreResult<S> {
        if fields.is_empty() {
            return Err(DocumentStoreError::Validation("update has no fields".into()));
        }
        if fields.contains_key(ID_KEY) {
            return Err(DocumentStoreError::Validation("the identifier cannot be updated".into()));
        }

        let filter = selector.into().into_filter();
        let key = canonical_key(&filter);
        let filter = filter_document(filter)?;

        let modified = self
            .guard(
                "find_and_modify",
                self.backend
                    .find_and_modify(&self.collection, filter, doc! { "$set": fields }),
            )
            .await
            .map_err(|e| {
                warn!(collection = %self.collection, filter = %key, error = %e, "unable to update");
                e
            })?
            .ok_or_else(|| {
                debug!(collection = %self.collection, filter = %key, "nothing to update");
                DocumentStoreError::NotFound(self.collection.clone(), key.clone())
            })?;
        self.after_write();

        let id = modified
            .get(ID_KEY)
            .and_then(Bson::as_object_id)
            .ok_or_else(|| DocumentStoreError::Decode(format!("updated document in {} has no identifier", self.collection)))?;
        debug!(collection = %self.collection, %id, "updated");

        self.find(id).one().await
    }

    /// Removes every document matching `selector`.
    ///
    /// Returns `Ok(true)` whether zero or many documents were removed; use
    /// [`Model::delete_count`] to tell the two apart.
    pub async fn delete(&self, selector: impl Into<Selector>) -> DocumentStoreResult<bool> {
        self.delete_count(selector)
            .await
            .map(|_| true)
    }

    /// Removes every document matching `selector` and returns how many were removed.
    pub async fn delete_count(&self, selector: impl Into<Selector>) -> DocumentStoreResult<u64> {
        let filter = selector.into().into_filter();
        let key = canonical_key(&filter);
        let filter = filter_document(filter)?;

        let removed = self
            .guard("remove_all", self.backend.remove_all(&self.collection, filter))
            .await
            .map_err(|e| {
                warn!(collection = %self.collection, filter = %key, error = %e, "unable to delete");
                e
            })?;
        self.after_write();
        debug!(collection = %self.collection, filter = %key, removed, "deleted");

        Ok(removed)
    }

    /// Runs a store operation under the model deadline, if one is set.
    pub(crate) async fn guard<T, F>(&self, operation: &'static str, future: F) -> DocumentStoreResult<T>
    where
        F: Future<Output = DocumentStoreResult<T>>,
    {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(collection = %self.collection, operation, ?limit, "deadline exceeded");
                    Err(DocumentStoreError::Timeout(operation.to_string(), limit))
                }
            },
            None => future.await,
        }
    }

    fn after_write(&self) {
        if self.cache_policy == CachePolicy::ClearOnWrite {
            self.cache.clear();
        }
    }
}

/// Converts a canonical filter into the document sent to the store.
pub(crate) fn filter_document(filter: Bson) -> DocumentStoreResult<Document> {
    match filter {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::Validation(format!("filter must be a document, got {other}"))),
    }
}

/// Builder for constructing [`Model`] instances.
pub struct ModelBuilder<S: Scheme, B: StoreBackend> {
    backend: B,
    collection: Option<String>,
    timeout: Option<Duration>,
    cache_policy: CachePolicy,
    _scheme: PhantomData<fn() -> S>,
}

impl<S: Scheme, B: StoreBackend> ModelBuilder<S, B> {
    /// Creates a builder with default options.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            collection: None,
            timeout: None,
            cache_policy: CachePolicy::default(),
            _scheme: PhantomData,
        }
    }

    /// Overrides the collection name derived from the scheme name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Sets a deadline applied to every store round trip.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets what happens to cached queries on writes.
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Builds the model.
    pub fn build(self) -> Model<S, B> {
        Model {
            backend: self.backend,
            collection: self
                .collection
                .unwrap_or_else(S::collection_name),
            timeout: self.timeout,
            cache_policy: self.cache_policy,
            cache: QueryCache::default(),
            _scheme: PhantomData,
        }
    }
}

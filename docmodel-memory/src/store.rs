//! In-memory storage implementation for document stores.
//!
//! Documents are kept per collection in insertion order behind an async-aware
//! read-write lock, so the natural order of a collection is the order documents were
//! inserted in.

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, stream};
use mea::{mutex::Mutex, rwlock::RwLock};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use docmodel_core::{
    backend::{Connector, DocumentCursor, FindOptions, StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    link::Link,
    scheme::ID_KEY,
};

use crate::evaluator::{DocumentEvaluator, apply_update};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// Finds scan every document of the collection; there is no indexing.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::{StoreBackend, FindOptions};
/// use bson::{doc, oid::ObjectId};
///
/// let store = InMemoryStore::new();
/// store.insert("Users", doc! { "_id": ObjectId::new(), "name": "Alice" }).await?;
///
/// let cursor = store.find("Users", doc! { "name": "Alice" }, FindOptions::default()).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of documents stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

fn matching(documents: &[Document], filter: &Document) -> DocumentStoreResult<Vec<bool>> {
    documents
        .iter()
        .map(|document| DocumentEvaluator::new(document).matches(filter))
        .collect()
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(documents) => documents,
            None => return Ok(stream::empty().boxed()),
        };

        let mut found = Vec::new();
        for document in documents {
            if DocumentEvaluator::new(document).matches(&filter)? {
                found.push(document.clone());
            }
        }

        let found = found
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(Ok)
            .collect::<Vec<_>>();
        debug!(collection, found = found.len(), "scanned collection");

        Ok(stream::iter(found).boxed())
    }

    async fn insert(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        let id = document
            .get(ID_KEY)
            .cloned()
            .ok_or_else(|| DocumentStoreError::Validation(format!("document has no {ID_KEY}")))?;

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        if documents.iter().any(|existing| existing.get(ID_KEY) == Some(&id)) {
            return Err(DocumentStoreError::DocumentAlreadyExists(display_id(&id), collection.to_string()));
        }
        documents.push(document);

        Ok(())
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(None);
        };

        for document in documents.iter_mut() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                let mut modified = document.clone();
                apply_update(&mut modified, &update)?;
                *document = modified.clone();

                return Ok(Some(modified));
            }
        }

        Ok(None)
    }

    async fn remove_all(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut remove = matching(documents, &filter)?.into_iter();
        let before = documents.len();
        documents.retain(|_| !remove.next().unwrap_or(false));

        Ok((before - documents.len()) as u64)
    }
}

fn display_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(id) => id.to_hex(),
        other => other.to_string(),
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

/// Opens in-memory sessions for named connections.
///
/// Links naming the same database share one store; the connection string is ignored.
pub struct InMemoryConnector {
    databases: Mutex<HashMap<String, InMemoryStore>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, link: &Link) -> DocumentStoreResult<Self::Backend> {
        Ok(self
            .databases
            .lock()
            .await
            .entry(link.db_name.clone())
            .or_default()
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use futures::TryStreamExt;

    async fn names(store: &InMemoryStore, filter: Document, options: FindOptions) -> Vec<String> {
        store
            .find("People", filter, options)
            .await
            .unwrap()
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .into_iter()
            .map(|document| document.get_str("name").unwrap().to_string())
            .collect()
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, age) in [("Alice", 31), ("Bob", 25), ("Carol", 40)] {
            store
                .insert("People", doc! { "_id": ObjectId::new(), "name": name, "age": age })
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn find_keeps_insertion_order_and_pages() {
        let store = seeded().await;

        assert_eq!(names(&store, doc! {}, FindOptions::default()).await, ["Alice", "Bob", "Carol"]);
        assert_eq!(
            names(&store, doc! {}, FindOptions { skip: Some(1), limit: Some(1) }).await,
            ["Bob"],
        );
        assert_eq!(
            names(&store, doc! { "age": { "$gte": 31 } }, FindOptions::default()).await,
            ["Alice", "Carol"],
        );
    }

    #[tokio::test]
    async fn missing_collection_is_empty() {
        let store = InMemoryStore::new();

        assert!(names(&store, doc! {}, FindOptions::default()).await.is_empty());
        assert_eq!(store.remove_all("People", doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_identifier_is_rejected() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();
        store.insert("People", doc! { "_id": id }).await.unwrap();

        let result = store.insert("People", doc! { "_id": id }).await;

        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(..))));
    }

    #[tokio::test]
    async fn find_and_modify_changes_first_match_only() {
        let store = seeded().await;

        let modified = store
            .find_and_modify("People", doc! { "age": { "$gt": 30 } }, doc! { "$set": { "vip": true } })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(modified.get_str("name").unwrap(), "Alice");
        assert_eq!(names(&store, doc! { "vip": true }, FindOptions::default()).await, ["Alice"]);
        assert!(
            store
                .find_and_modify("People", doc! { "name": "Dave" }, doc! { "$set": { "vip": true } })
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn remove_all_reports_count() {
        let store = seeded().await;

        assert_eq!(store.remove_all("People", doc! { "age": { "$lt": 35 } }).await.unwrap(), 2);
        assert_eq!(names(&store, doc! {}, FindOptions::default()).await, ["Carol"]);
    }

    #[tokio::test]
    async fn connector_shares_store_per_database() {
        let connector = InMemoryConnector::new();
        let link = |db: &str| Link { spec: "memory://".into(), db_name: db.into(), default: false };

        let first = connector.connect(&link("app")).await.unwrap();
        let second = connector.connect(&link("app")).await.unwrap();
        let other = connector.connect(&link("audit")).await.unwrap();
        first.insert("People", doc! { "_id": ObjectId::new() }).await.unwrap();

        assert_eq!(second.count("People").await, 1);
        assert_eq!(other.count("People").await, 0);
    }
}

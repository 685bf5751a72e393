#![allow(dead_code)]

use async_trait::async_trait;
use bson::Document;
use docmodel::{
    backend::{DocumentCursor, FindOptions, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
    memory::InMemoryStore,
    prelude::*,
};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Scheme)]
pub struct PersonScheme {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Record)]
pub struct Address {
    pub city: String,
    #[scheme(hidden)]
    pub geohash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Scheme)]
pub struct UserScheme {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    #[scheme(hidden)]
    pub password: String,
    #[serde(default)]
    #[scheme(nested)]
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Scheme)]
pub struct PostScheme {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[scheme(output = "writer")]
    pub author: Ref<UserScheme>,
    #[serde(default)]
    pub reviewers: Vec<Ref<PersonScheme>>,
}

/// A scheme without an identifier field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Scheme)]
pub struct NoteScheme {
    pub text: String,
}

/// Delays every call by a fixed duration.
#[derive(Debug, Clone)]
pub struct SlowBackend {
    pub inner: InMemoryStore,
    pub delay: Duration,
}

#[async_trait]
impl StoreBackend for SlowBackend {
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> DocumentStoreResult<DocumentCursor> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(collection, filter, options).await
    }

    async fn insert(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(collection, document).await
    }

    async fn find_and_modify(&self, collection: &str, filter: Document, update: Document) -> DocumentStoreResult<Option<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_and_modify(collection, filter, update).await
    }

    async fn remove_all(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove_all(collection, filter).await
    }
}

/// Counts find calls made against an in-memory store.
#[derive(Debug, Default)]
pub struct CountingBackend {
    pub inner: InMemoryStore,
    pub finds: AtomicUsize,
}

impl CountingBackend {
    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackend for CountingBackend {
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> DocumentStoreResult<DocumentCursor> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, filter, options).await
    }

    async fn insert(&self, collection: &str, document: Document) -> DocumentStoreResult<()> {
        self.inner.insert(collection, document).await
    }

    async fn find_and_modify(&self, collection: &str, filter: Document, update: Document) -> DocumentStoreResult<Option<Document>> {
        self.inner.find_and_modify(collection, filter, update).await
    }

    async fn remove_all(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        self.inner.remove_all(collection, filter).await
    }
}

/// Yields `documents` and then fails mid-iteration.
#[derive(Debug, Clone)]
pub struct FailingCursorBackend {
    pub documents: Vec<Document>,
}

#[async_trait]
impl StoreBackend for FailingCursorBackend {
    async fn find(&self, _collection: &str, _filter: Document, _options: FindOptions) -> DocumentStoreResult<DocumentCursor> {
        let items = self
            .documents
            .iter()
            .cloned()
            .map(Ok)
            .chain([Err(DocumentStoreError::Backend("cursor killed".into())), Ok(Document::new())]);

        Ok(stream::iter(items.collect::<Vec<_>>()).boxed())
    }

    async fn insert(&self, _collection: &str, _document: Document) -> DocumentStoreResult<()> {
        Err(DocumentStoreError::Backend("read only".into()))
    }

    async fn find_and_modify(&self, _collection: &str, _filter: Document, _update: Document) -> DocumentStoreResult<Option<Document>> {
        Err(DocumentStoreError::Backend("read only".into()))
    }

    async fn remove_all(&self, _collection: &str, _filter: Document) -> DocumentStoreResult<u64> {
        Err(DocumentStoreError::Backend("read only".into()))
    }
}

pub async fn create_person(model: &Model<PersonScheme, InMemoryStore>, name: &str) -> PersonScheme {
    model
        .create_fields(doc! { "name": name })
        .await
        .unwrap()
}

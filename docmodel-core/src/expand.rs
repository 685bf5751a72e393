//! Relation expansion.
//!
//! Expansion replaces an unresolved [`Ref`](crate::reference::Ref) field with the document it
//! points to, on one document or on every element of a sequence:
//!
//! ```ignore
//! let mut posts = posts.find_all().all().await?;
//! let report = posts.expand(posts.iter_mut(), "author").await;
//!
//! for failure in &report.failures {
//!     eprintln!("post {} not expanded: {}", failure.index, failure.error);
//! }
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{
    backend::{FindOptions, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    scheme::{FieldDescriptor, ID_KEY, Scheme},
    selector::canonical_key,
};

/// Outcome of expanding one field across a set of documents.
#[derive(Debug, Default)]
pub struct ExpandReport {
    /// References replaced with their document.
    pub resolved: usize,
    /// References that were already resolved.
    pub skipped: usize,
    /// Elements whose expansion failed; they are left unchanged.
    pub failures: Vec<ExpandFailure>,
}

impl ExpandReport {
    /// Returns `true` when no element failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One element that could not be expanded.
#[derive(Debug)]
pub struct ExpandFailure {
    /// Position of the element in the expanded sequence.
    pub index: usize,
    /// Why the element was skipped.
    pub error: DocumentStoreError,
}

type Fetched = HashMap<(String, ObjectId), Document>;

impl<S: Scheme, B: StoreBackend> Model<S, B> {
    /// Resolves the reference field exposed as `field` on every target.
    ///
    /// `field` is the output name of the field, not its declared name. Each target is
    /// expanded independently: a missing field, a field that is not a reference, or a
    /// dangling identifier is recorded in the report and leaves that target unchanged.
    /// Related documents are read from the collection of the referenced scheme; an
    /// identifier that appears more than once is read once.
    pub async fn expand<'a, I>(&self, targets: I, field: &str) -> ExpandReport
    where
        I: IntoIterator<Item = &'a mut S>,
    {
        let descriptor = S::field_by_output(field);
        let mut fetched = Fetched::new();
        let mut report = ExpandReport::default();

        for (index, target) in targets.into_iter().enumerate() {
            match self.expand_target(target, field, descriptor, &mut fetched).await {
                Ok(true) => report.resolved += 1,
                Ok(false) => report.skipped += 1,
                Err(error) => {
                    warn!(collection = %self.collection, field, index, error = %error, "unable to expand");
                    report.failures.push(ExpandFailure { index, error });
                }
            }
        }
        debug!(
            collection = %self.collection,
            field,
            resolved = report.resolved,
            skipped = report.skipped,
            failed = report.failures.len(),
            "expanded",
        );

        report
    }

    async fn expand_target(
        &self,
        target: &mut S,
        field: &str,
        descriptor: Option<&'static FieldDescriptor>,
        fetched: &mut Fetched,
    ) -> DocumentStoreResult<bool> {
        let descriptor = descriptor.ok_or_else(|| {
            DocumentStoreError::Expansion(field.to_string(), "field not found".into())
        })?;
        if !descriptor.is_reference() {
            return Err(DocumentStoreError::Expansion(
                field.to_string(),
                format!("field holds {:?}, not a reference", descriptor.kind),
            ));
        }

        let slot = target.reference_mut(descriptor.name).ok_or_else(|| {
            DocumentStoreError::Expansion(field.to_string(), "field is not writable".into())
        })?;
        if slot.is_resolved() {
            return Ok(false);
        }

        let id = slot.target_id().ok_or_else(|| {
            DocumentStoreError::Expansion(field.to_string(), "reference holds no identifier".into())
        })?;
        let key = (slot.target_collection(), id);

        let document = match fetched.get(&key) {
            Some(document) => document.clone(),
            None => {
                let document = self.fetch_related(&key.0, id).await?;
                fetched.insert(key, document.clone());
                document
            }
        };
        slot.resolve(document)?;

        Ok(true)
    }

    async fn fetch_related(&self, collection: &str, id: ObjectId) -> DocumentStoreResult<Document> {
        let filter = doc! { ID_KEY: id };
        let key = canonical_key(&Bson::Document(filter.clone()));
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::default()
        };

        self.guard("find", async {
            self.backend
                .find(collection, filter, options)
                .await?
                .next()
                .await
                .transpose()
        })
        .await?
        .ok_or_else(|| DocumentStoreError::NotFound(collection.to_string(), key))
    }
}

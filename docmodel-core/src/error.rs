//! Error types and result types for model operations.
//!
//! Every operation in this crate returns a [`DocumentStoreResult<T>`]. The variants of
//! [`DocumentStoreError`] let callers tell apart a lookup that matched nothing from a
//! broken connection, a malformed payload, or a shape mismatch between a stored
//! document and its scheme.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::time::Duration;
use thiserror::Error;

/// Represents all possible errors that can occur when working with a model.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A point lookup matched no document.
    /// The first argument is the collection name, the second the canonical filter.
    #[error("No document matching {1} in collection {0}")]
    NotFound(String, String),
    /// A stored document could not be decoded into the target scheme.
    #[error("Decode error: {0}")]
    Decode(String),
    /// No usable session or connection is available.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A payload, selector or update has an unsupported shape or touches the identifier.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A relation field could not be expanded.
    /// The first argument is the field name, the second the reason.
    #[error("Unable to expand field {0}: {1}")]
    Expansion(String, String),
    /// A store operation exceeded the model deadline.
    #[error("Operation {0} timed out after {1:?}")]
    Timeout(String, Duration),
    /// Connection configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A document with the given identifier already exists in the collection.
    /// The first argument is the identifier, the second the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// Serialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns `true` when the error means "no rows" rather than a failure of the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound(..))
    }
}

/// A specialized `Result` type for model operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to the model and query types, the scheme traits and derives,
//! references, the encoder, the backend traits and the error types.

pub use docmodel_core::{
    backend::{Connector, FindOptions, StoreBackend, StoreBackendBuilder},
    encoder::{Encoder, JsonEncoder, Project},
    error::{DocumentStoreError, DocumentStoreResult},
    expand::{ExpandFailure, ExpandReport},
    link::{Link, LinkConfig, Linker},
    model::{CachePolicy, Model, ModelBuilder, Payload},
    query::{BoundQuery, Query, DEFAULT_PAGE_SIZE},
    reference::Ref,
    scheme::{Record, Scheme},
    selector::Selector,
};
pub use docmodel_macros::{Record, Scheme};

pub use bson::{Bson, Document, doc, oid::ObjectId};

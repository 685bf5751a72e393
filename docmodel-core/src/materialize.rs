//! Draining store cursors into sequences.

use bson::Document;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::{backend::DocumentCursor, error::DocumentStoreResult};

/// Decodes every document of `cursor` into `dest`, in cursor order.
///
/// `dest` is cleared first; its capacity is kept and grown from the cursor's size hint.
/// The first iteration or decode error ends materialization and is logged: what was read
/// before it stays in `dest`. Returns the number of elements materialized.
pub(crate) async fn drain<T, F>(
    mut cursor: DocumentCursor,
    dest: &mut Vec<T>,
    mut decode: F,
    collection: &str,
) -> usize
where
    F: FnMut(Document) -> DocumentStoreResult<T>,
{
    dest.clear();

    let (lower, _) = cursor.size_hint();
    dest.reserve(lower);

    while let Some(item) = cursor.next().await {
        match item.and_then(&mut decode) {
            Ok(value) => dest.push(value),
            Err(e) => {
                warn!(collection, materialized = dest.len(), error = %e, "cursor stopped early");
                break;
            }
        }
    }
    debug!(collection, count = dest.len(), "materialized");

    dest.len()
}

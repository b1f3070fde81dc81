//! Uncached-set resolution.

use fusarex_common::models::Document;
use fusarex_store::cache::{safe_key, ExtractionCache};

/// Documents with no cache entry yet, in input order.
///
/// Pure set difference against the cache directory listing. Both the write
/// path and this lookup derive keys through the same [`safe_key`], so a
/// cached document can never be misclassified as pending.
pub fn uncached<'a>(
    documents: &'a [Document],
    cache: &ExtractionCache,
) -> fusarex_store::Result<Vec<&'a Document>> {
    let cached = cache.cached_keys()?;
    Ok(documents
        .iter()
        .filter(|doc| !cached.contains(&safe_key(&doc.id)))
        .collect())
}

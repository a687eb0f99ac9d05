//! Semantic search over the ingested corpus

use log::debug;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::storage::VectorStore;

/// Embed `text` and return the contents of every stored document whose
/// cosine similarity to it is at least `threshold`, in insertion order
pub fn semantic_search(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    text: &str,
    threshold: f32,
) -> Result<Vec<String>> {
    let query = embedder.embed(text)?;
    let hits = store.search(&query, threshold)?;
    debug!(
        "Search with {} ({} dims) matched {} documents at >= {}",
        embedder.model_name(),
        query.len(),
        hits.len(),
        threshold
    );
    Ok(hits)
}

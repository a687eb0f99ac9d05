//! Storage trait definitions

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::StoredDocument;

/// Append-only store of embedded documents with brute-force search
///
/// Inserts enforce no uniqueness on `email_id`; callers that want
/// idempotent ingestion check [`VectorStore::contains_source`] first.
pub trait VectorStore: Send + Sync {
    /// Append one document
    fn insert(&self, document: StoredDocument) -> Result<()>;

    /// All documents, in insertion order
    fn documents(&self) -> Result<Vec<StoredDocument>>;

    /// Whether any document was ingested from `email_id`
    fn contains_source(&self, email_id: &str) -> Result<bool>;

    /// Count stored documents
    fn count(&self) -> Result<usize>;

    /// Contents of every document whose similarity to `query` is at least
    /// `threshold`, in insertion order
    ///
    /// Documents of a different dimensionality are skipped, not errors.
    fn search(&self, query: &[f32], threshold: f32) -> Result<Vec<String>> {
        Ok(self
            .documents()?
            .into_iter()
            .filter(|doc| passes_threshold(&doc.embedding, query, threshold))
            .map(|doc| doc.contents)
            .collect())
    }
}

/// Threshold test used by every search implementation
pub(crate) fn passes_threshold(embedding: &[f32], query: &[f32], threshold: f32) -> bool {
    if embedding.len() != query.len() {
        return false;
    }
    cosine_similarity(embedding, query).is_ok_and(|score| score >= threshold)
}

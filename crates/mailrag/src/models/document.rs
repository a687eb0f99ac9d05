//! Stored document model

use serde::{Deserialize, Serialize};

/// Fixed-length embedding produced by the embedding service
pub type Embedding = Vec<f32>;

/// One ingested message: its text, its embedding, and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub contents: String,
    pub embedding: Embedding,
    pub email_id: String,
}

impl StoredDocument {
    pub fn new(
        contents: impl Into<String>,
        embedding: Embedding,
        email_id: impl Into<String>,
    ) -> Self {
        Self {
            contents: contents.into(),
            embedding,
            email_id: email_id.into(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedding.len()
    }
}

//! In-memory storage implementation
//!
//! Used for tests and dry runs; nothing survives the process.

use std::sync::RwLock;

use super::VectorStore;
use crate::error::Result;
use crate::models::StoredDocument;

#[derive(Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn insert(&self, document: StoredDocument) -> Result<()> {
        self.documents.write().unwrap().push(document);
        Ok(())
    }

    fn documents(&self) -> Result<Vec<StoredDocument>> {
        Ok(self.documents.read().unwrap().clone())
    }

    fn contains_source(&self, email_id: &str) -> Result<bool> {
        Ok(self
            .documents
            .read()
            .unwrap()
            .iter()
            .any(|doc| doc.email_id == email_id))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.documents.read().unwrap().len())
    }
}

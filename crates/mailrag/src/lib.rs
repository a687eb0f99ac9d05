//! Mailrag - turns a Gmail mailbox into a searchable embedding corpus
//!
//! This crate provides:
//! - OAuth credential refresh and first-run loopback consent
//! - Incremental message listing and plain-text body extraction
//! - A client for an Ollama-compatible embedding service
//! - An append-only vector store with threshold cosine search
//! - A persisted date cursor and the sync pass that ties it all together
//!
//! Every network call blocks the caller and is bounded by a timeout.

pub mod config;
pub mod embedding;
pub mod error;
pub mod gmail;
pub mod models;
pub mod query;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use embedding::{Embedder, OllamaClient, cosine_similarity};
pub use error::{Error, Result};
pub use gmail::{
    Credential, CredentialManager, GmailClient, LoopbackConsent, MessageSource, OAuthClient,
    OAuthEndpoints, TokenSource, acquire_initial_grant, fetch_all, fetch_body, list_ids,
};
pub use models::{
    EmailAddress, Embedding, Message, MessageId, MessageRef, StoredDocument, SyncCursor, ThreadId,
};
pub use query::semantic_search;
pub use storage::{CredentialFile, CursorFile, InMemoryVectorStore, SqliteVectorStore, VectorStore};
pub use sync::{SyncContext, SyncStats, sync_mailbox};

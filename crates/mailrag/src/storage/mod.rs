//! Storage traits and implementations
//!
//! This module defines the vector store abstraction plus the small files
//! that carry state between runs (sync cursor, credential).
//! The trait-based design allows swapping between in-memory and persistent
//! storage implementations.

mod credential_file;
mod cursor_file;
mod memory;
mod sqlite;
mod traits;

pub use credential_file::CredentialFile;
pub use cursor_file::CursorFile;
pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;
pub use traits::VectorStore;

//! Sync engine for ingesting mail into the vector store
//!
//! Re-runs are incremental (the cursor bounds the listing) and idempotent
//! (messages that already have a document are skipped).

mod pipeline;

pub use pipeline::{SyncContext, SyncStats, sync_mailbox};

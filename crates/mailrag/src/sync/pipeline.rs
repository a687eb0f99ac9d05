//! The sync pass: refresh → cursor → list → fetch → embed/insert → advance

use std::time::Instant;

use log::{debug, info, warn};

use crate::embedding::Embedder;
use crate::error::Result;
use crate::gmail::{MessageSource, TokenSource, fetch_all, list_ids};
use crate::models::{MessageRef, StoredDocument, SyncCursor};
use crate::storage::{CursorFile, VectorStore};

/// Collaborators for one sync pass
pub struct SyncContext<'a> {
    pub tokens: &'a dyn TokenSource,
    pub source: &'a dyn MessageSource,
    pub embedder: &'a dyn Embedder,
    pub store: &'a dyn VectorStore,
    pub cursor: &'a CursorFile,
}

/// Statistics from a sync pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStats {
    /// Cursor the pass started from
    pub since: SyncCursor,
    /// Cursor written at the end of the pass
    pub advanced_to: SyncCursor,
    /// Number of ids returned by listing
    pub messages_listed: usize,
    /// Number of messages skipped because a document already exists
    pub messages_skipped: usize,
    /// Number of messages with no plain-text body (not embedded)
    pub messages_without_text: usize,
    /// Number of documents inserted
    pub documents_inserted: usize,
    /// Duration of the pass
    pub duration_ms: u64,
}

/// Run one sync pass
///
/// Any failure aborts the pass and leaves the cursor where it was, so the
/// next pass covers the same window. Documents inserted before the failure
/// stay, and are skipped on that next pass.
pub fn sync_mailbox(ctx: &SyncContext<'_>) -> Result<SyncStats> {
    let start = Instant::now();

    // 1. Nothing proceeds without a fresh token
    ctx.tokens.current_token()?;

    // 2. Window start
    let since = ctx.cursor.load()?;
    info!("Syncing mail after {}", since);

    // 3. List ids
    let listed = list_ids(ctx.source, &since)?;
    let messages_listed = listed.len();

    // 4. Skip messages ingested by an earlier, partially failed pass
    let mut to_fetch: Vec<MessageRef> = Vec::with_capacity(listed.len());
    for msg_ref in listed {
        if ctx.store.contains_source(msg_ref.id.as_str())? {
            debug!("Skipping already ingested message {}", msg_ref.id.as_str());
        } else {
            to_fetch.push(msg_ref);
        }
    }
    let messages_skipped = messages_listed - to_fetch.len();

    // 5. Fetch bodies
    let messages = fetch_all(ctx.source, &to_fetch)?;

    // 6. Embed and insert, one message at a time in listing order
    let mut documents_inserted = 0;
    let mut messages_without_text = 0;
    for message in messages {
        if message.body_text.trim().is_empty() {
            warn!("Message {} has no plain-text body; not embedded", message.id.as_str());
            messages_without_text += 1;
            continue;
        }

        let embedding = ctx.embedder.embed(&message.body_text)?;
        ctx.store
            .insert(StoredDocument::new(message.body_text, embedding, message.id.0))?;
        documents_inserted += 1;
    }

    // 7. Only a fully successful pass moves the cursor
    let advanced_to = SyncCursor::today();
    ctx.cursor.store(&advanced_to)?;

    let stats = SyncStats {
        since,
        advanced_to,
        messages_listed,
        messages_skipped,
        messages_without_text,
        documents_inserted,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Sync complete: {} listed, {} skipped, {} inserted with {} in {}ms",
        stats.messages_listed,
        stats.messages_skipped,
        stats.documents_inserted,
        ctx.embedder.model_name(),
        stats.duration_ms
    );
    Ok(stats)
}

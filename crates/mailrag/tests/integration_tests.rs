//! Integration tests for the mailrag crate
//!
//! These tests drive a full sync pass against an in-process mailbox and
//! embedder, then query the resulting store.

use std::cell::RefCell;
use std::collections::HashMap;

use base64::prelude::*;
use mailrag::gmail::api::{
    GmailMessage, ListMessagesResponse, MessageBody, MessagePart, MessageRef,
};
use mailrag::{
    CursorFile, Embedder, Embedding, Error, InMemoryVectorStore, MessageId, MessageSource, Result,
    SqliteVectorStore, StoredDocument, SyncContext, SyncCursor, TokenSource, VectorStore,
    semantic_search, sync_mailbox,
};
use tempfile::TempDir;

struct StaticToken;

impl TokenSource for StaticToken {
    fn current_token(&self) -> Result<String> {
        Ok("ya29.test".to_string())
    }
}

/// Mailbox served two ids per page
struct FakeMailbox {
    messages: Vec<(&'static str, &'static str)>,
    queries: RefCell<Vec<String>>,
    fetched: RefCell<Vec<String>>,
}

impl FakeMailbox {
    fn new(messages: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            messages,
            queries: RefCell::new(Vec::new()),
            fetched: RefCell::new(Vec::new()),
        }
    }
}

impl MessageSource for FakeMailbox {
    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<ListMessagesResponse> {
        self.queries.borrow_mut().push(query.to_string());
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + 2).min(self.messages.len());

        Ok(ListMessagesResponse {
            messages: Some(
                self.messages[start..end]
                    .iter()
                    .map(|(id, _)| MessageRef {
                        id: id.to_string(),
                        thread_id: format!("thread-{}", id),
                    })
                    .collect(),
            ),
            next_page_token: (end < self.messages.len()).then(|| end.to_string()),
            result_size_estimate: Some(self.messages.len() as u32),
        })
    }

    fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        self.fetched.borrow_mut().push(id.as_str().to_string());
        let (_, body) = self
            .messages
            .iter()
            .find(|(m, _)| *m == id.as_str())
            .ok_or_else(|| Error::Network(format!("404 for {}", id.as_str())))?;

        // multipart/alternative with the plain part second
        Ok(GmailMessage {
            id: id.as_str().to_string(),
            thread_id: format!("thread-{}", id.as_str()),
            internal_date: Some("1735689600000".to_string()),
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                parts: Some(vec![
                    MessagePart {
                        mime_type: Some("text/html".to_string()),
                        body: Some(MessageBody {
                            size: None,
                            data: Some(BASE64_URL_SAFE.encode(format!("<p>{}</p>", body))),
                        }),
                        ..Default::default()
                    },
                    MessagePart {
                        mime_type: Some("text/plain".to_string()),
                        body: Some(MessageBody {
                            size: None,
                            data: Some(BASE64_URL_SAFE.encode(body)),
                        }),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        })
    }
}

/// Embeds from a lookup table; unknown text is a service error
struct LookupEmbedder {
    table: HashMap<String, Embedding>,
}

impl LookupEmbedder {
    fn new(entries: &[(&str, Embedding)]) -> Self {
        Self {
            table: entries.iter().map(|(t, e)| (t.to_string(), e.clone())).collect(),
        }
    }
}

impl Embedder for LookupEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.table.get(text).cloned().ok_or_else(|| Error::EmbeddingService {
            status: Some(500),
            body: format!("cannot embed {:?}", text),
        })
    }

    fn model_name(&self) -> &str {
        "lookup"
    }
}

fn seeded_cursor(dir: &TempDir) -> CursorFile {
    let cursor = CursorFile::in_dir(dir.path());
    cursor.store(&SyncCursor::new(2025, 1, 1)).unwrap();
    cursor
}

#[test]
fn test_sync_then_search() {
    let dir = TempDir::new().unwrap();
    let cursor = seeded_cursor(&dir);
    let store = SqliteVectorStore::open(dir.path().join("vectors.test.sqlite")).unwrap();
    let mailbox = FakeMailbox::new(vec![("a", "hello"), ("b", "world")]);
    let embedder = LookupEmbedder::new(&[("hello", vec![1.0, 0.0]), ("world", vec![0.0, 1.0])]);

    let stats = sync_mailbox(&SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &embedder,
        store: &store,
        cursor: &cursor,
    })
    .unwrap();

    assert_eq!(mailbox.queries.borrow().as_slice(), ["after:2025/1/1"]);
    assert_eq!(stats.since, SyncCursor::new(2025, 1, 1));
    assert_eq!(stats.documents_inserted, 2);
    assert_eq!(
        store.documents().unwrap(),
        vec![
            StoredDocument::new("hello", vec![1.0, 0.0], "a"),
            StoredDocument::new("world", vec![0.0, 1.0], "b"),
        ]
    );
    assert_eq!(cursor.load().unwrap(), SyncCursor::today());

    assert_eq!(store.search(&[1.0, 0.0], 0.99).unwrap(), vec!["hello".to_string()]);

    let query_embedder = LookupEmbedder::new(&[("greeting", vec![0.8, 0.6])]);
    assert_eq!(
        semantic_search(&query_embedder, &store, "greeting", 0.5).unwrap(),
        vec!["hello".to_string(), "world".to_string()]
    );
}

#[test]
fn test_multi_page_listing_preserves_order() {
    let dir = TempDir::new().unwrap();
    let cursor = seeded_cursor(&dir);
    let store = InMemoryVectorStore::new();
    let mailbox = FakeMailbox::new(vec![
        ("m1", "one"),
        ("m2", "two"),
        ("m3", "three"),
        ("m4", "four"),
        ("m5", "five"),
    ]);
    let embedder = LookupEmbedder::new(&[
        ("one", vec![1.0]),
        ("two", vec![2.0]),
        ("three", vec![3.0]),
        ("four", vec![4.0]),
        ("five", vec![5.0]),
    ]);

    let stats = sync_mailbox(&SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &embedder,
        store: &store,
        cursor: &cursor,
    })
    .unwrap();

    assert_eq!(mailbox.queries.borrow().len(), 3);
    assert_eq!(stats.messages_listed, 5);
    let ids: Vec<String> = store.documents().unwrap().into_iter().map(|d| d.email_id).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3", "m4", "m5"]);
}

#[test]
fn test_rerun_inserts_nothing_new() {
    let dir = TempDir::new().unwrap();
    let cursor = seeded_cursor(&dir);
    let store = InMemoryVectorStore::new();
    let mailbox = FakeMailbox::new(vec![("a", "hello"), ("b", "world")]);
    let embedder = LookupEmbedder::new(&[("hello", vec![1.0, 0.0]), ("world", vec![0.0, 1.0])]);
    let ctx = SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &embedder,
        store: &store,
        cursor: &cursor,
    };

    sync_mailbox(&ctx).unwrap();
    let stats = sync_mailbox(&ctx).unwrap();

    assert_eq!(stats.since, SyncCursor::today());
    assert_eq!(stats.messages_skipped, 2);
    assert_eq!(stats.documents_inserted, 0);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_partial_failure_keeps_cursor_and_recovers() {
    let dir = TempDir::new().unwrap();
    let cursor = seeded_cursor(&dir);
    let store = InMemoryVectorStore::new();
    let mailbox = FakeMailbox::new(vec![("a", "hello"), ("b", "world"), ("c", "again")]);

    // "world" cannot be embedded on the first pass
    let flaky = LookupEmbedder::new(&[("hello", vec![1.0, 0.0]), ("again", vec![1.0, 1.0])]);
    let err = sync_mailbox(&SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &flaky,
        store: &store,
        cursor: &cursor,
    })
    .unwrap_err();

    assert!(matches!(err, Error::EmbeddingService { status: Some(500), .. }));
    assert_eq!(cursor.load().unwrap(), SyncCursor::new(2025, 1, 1));
    assert_eq!(store.count().unwrap(), 1);

    mailbox.fetched.borrow_mut().clear();
    let healthy = LookupEmbedder::new(&[
        ("hello", vec![1.0, 0.0]),
        ("world", vec![0.0, 1.0]),
        ("again", vec![1.0, 1.0]),
    ]);
    let stats = sync_mailbox(&SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &healthy,
        store: &store,
        cursor: &cursor,
    })
    .unwrap();

    assert_eq!(mailbox.fetched.borrow().as_slice(), ["b", "c"]);
    assert_eq!(stats.documents_inserted, 2);
    let ids: Vec<String> = store.documents().unwrap().into_iter().map(|d| d.email_id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(cursor.load().unwrap(), SyncCursor::today());
}

#[test]
fn test_fetch_failure_inserts_nothing() {
    struct Vanishing(FakeMailbox);

    impl MessageSource for Vanishing {
        fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<ListMessagesResponse> {
            self.0.list_page(query, page_token)
        }

        fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
            if id.as_str() == "b" {
                return Err(Error::Network("message deleted mid-sync".to_string()));
            }
            self.0.get_message(id)
        }
    }

    let dir = TempDir::new().unwrap();
    let cursor = seeded_cursor(&dir);
    let store = InMemoryVectorStore::new();
    let mailbox = Vanishing(FakeMailbox::new(vec![("a", "hello"), ("b", "world")]));
    let embedder = LookupEmbedder::new(&[("hello", vec![1.0, 0.0]), ("world", vec![0.0, 1.0])]);

    let err = sync_mailbox(&SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &embedder,
        store: &store,
        cursor: &cursor,
    })
    .unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(cursor.load().unwrap(), SyncCursor::new(2025, 1, 1));
}

#[test]
fn test_corrupt_cursor_aborts_sync() {
    let dir = TempDir::new().unwrap();
    let cursor = CursorFile::in_dir(dir.path());
    std::fs::write(cursor.path(), "not json").unwrap();
    let store = InMemoryVectorStore::new();
    let mailbox = FakeMailbox::new(vec![("a", "hello")]);
    let embedder = LookupEmbedder::new(&[("hello", vec![1.0])]);

    let err = sync_mailbox(&SyncContext {
        tokens: &StaticToken,
        source: &mailbox,
        embedder: &embedder,
        store: &store,
        cursor: &cursor,
    })
    .unwrap_err();

    assert!(matches!(err, Error::CacheCorrupt(_)));
    assert!(mailbox.queries.borrow().is_empty());
}

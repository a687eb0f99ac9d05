//! Listing and retrieval over a [`MessageSource`]

use log::debug;

use super::client::MessageSource;
use super::normalize::normalize_message;
use crate::error::Result;
use crate::models::{Message, MessageId, MessageRef, SyncCursor};

/// List every message newer than `since`, following page tokens to the end
///
/// Ids come back in arrival order. A failed page discards everything
/// gathered so far.
pub fn list_ids<S: MessageSource + ?Sized>(
    source: &S,
    since: &SyncCursor,
) -> Result<Vec<MessageRef>> {
    let query = since.search_query();
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let response = source.list_page(&query, page_token.as_deref())?;
        pages += 1;

        if let Some(messages) = response.messages {
            ids.extend(
                messages
                    .into_iter()
                    .map(|m| MessageRef::new(m.id, m.thread_id)),
            );
        }

        match response.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    debug!("Listed {} messages in {} pages for {}", ids.len(), pages, query);
    Ok(ids)
}

/// Retrieve one message and decode its body
pub fn fetch_body<S: MessageSource + ?Sized>(source: &S, id: &MessageId) -> Result<Message> {
    normalize_message(source.get_message(id)?)
}

/// Retrieve every message in order; the first failure aborts the whole batch
pub fn fetch_all<S: MessageSource + ?Sized>(
    source: &S,
    ids: &[MessageRef],
) -> Result<Vec<Message>> {
    ids.iter().map(|r| fetch_body(source, &r.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::gmail::api::{self, GmailMessage, ListMessagesResponse, MessageBody, MessagePart};
    use base64::prelude::*;
    use std::cell::RefCell;

    /// N pages of K ids each, then a page with an empty token
    struct PagedSource {
        pages: usize,
        per_page: usize,
        queries: RefCell<Vec<(String, Option<String>)>>,
        fail_on_page: Option<usize>,
    }

    impl PagedSource {
        fn new(pages: usize, per_page: usize) -> Self {
            Self {
                pages,
                per_page,
                queries: RefCell::new(Vec::new()),
                fail_on_page: None,
            }
        }
    }

    impl MessageSource for PagedSource {
        fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<ListMessagesResponse> {
            self.queries
                .borrow_mut()
                .push((query.to_string(), page_token.map(String::from)));

            let page: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            if self.fail_on_page == Some(page) {
                return Err(Error::Network("page fetch failed".to_string()));
            }

            let messages = (0..self.per_page)
                .map(|i| api::MessageRef {
                    id: format!("p{}-m{}", page, i),
                    thread_id: format!("t{}", page),
                })
                .collect();
            let next = if page + 1 < self.pages {
                Some((page + 1).to_string())
            } else {
                Some(String::new())
            };

            Ok(ListMessagesResponse {
                messages: Some(messages),
                next_page_token: next,
                result_size_estimate: None,
            })
        }

        fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
            let data = if id.as_str() == "broken" {
                "%%%".to_string()
            } else {
                BASE64_URL_SAFE_NO_PAD.encode(format!("body of {}", id.as_str()))
            };
            Ok(GmailMessage {
                id: id.as_str().to_string(),
                thread_id: "t".to_string(),
                internal_date: None,
                payload: Some(MessagePart {
                    mime_type: Some("text/plain".to_string()),
                    headers: None,
                    body: Some(MessageBody {
                        size: None,
                        data: Some(data),
                    }),
                    parts: None,
                }),
            })
        }
    }

    #[test]
    fn test_list_ids_collects_all_pages_in_order() {
        let source = PagedSource::new(3, 4);
        let ids = list_ids(&source, &SyncCursor::new(2025, 1, 1)).unwrap();

        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0].id.as_str(), "p0-m0");
        assert_eq!(ids[3].id.as_str(), "p0-m3");
        assert_eq!(ids[4].id.as_str(), "p1-m0");
        assert_eq!(ids[11].id.as_str(), "p2-m3");

        let queries = source.queries.borrow();
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|(q, _)| q == "after:2025/1/1"));
        assert_eq!(queries[0].1, None);
        assert_eq!(queries[1].1.as_deref(), Some("1"));
    }

    #[test]
    fn test_list_ids_stops_without_token() {
        struct SinglePage;
        impl MessageSource for SinglePage {
            fn list_page(&self, _: &str, _: Option<&str>) -> Result<ListMessagesResponse> {
                Ok(ListMessagesResponse::default())
            }
            fn get_message(&self, _: &MessageId) -> Result<GmailMessage> {
                unreachable!()
            }
        }

        let ids = list_ids(&SinglePage, &SyncCursor::new(2025, 1, 1)).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_list_ids_page_failure_discards_ids() {
        let mut source = PagedSource::new(3, 2);
        source.fail_on_page = Some(2);

        let err = list_ids(&source, &SyncCursor::new(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_fetch_all_preserves_order() {
        let source = PagedSource::new(1, 0);
        let ids = vec![MessageRef::new("b", "t"), MessageRef::new("a", "t")];

        let messages = fetch_all(&source, &ids).unwrap();
        assert_eq!(messages[0].body_text, "body of b");
        assert_eq!(messages[1].body_text, "body of a");
    }

    #[test]
    fn test_fetch_all_aborts_on_first_failure() {
        let source = PagedSource::new(1, 0);
        let ids = vec![
            MessageRef::new("a", "t"),
            MessageRef::new("broken", "t"),
            MessageRef::new("c", "t"),
        ];

        let err = fetch_all(&source, &ids).unwrap_err();
        assert!(matches!(err, Error::Decode { ref id, .. } if id == "broken"));
    }
}

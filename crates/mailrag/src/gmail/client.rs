//! Gmail API HTTP client
//!
//! Provides methods for listing and fetching messages from the Gmail API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::time::Duration;

use log::debug;
use serde::de::DeserializeOwned;
use url::Url;

use super::api::{GmailMessage, ListMessagesResponse};
use super::auth::TokenSource;
use crate::error::{Error, Result};
use crate::models::MessageId;

/// Anything that can serve message listings and full messages
pub trait MessageSource {
    /// Fetch one page of ids matching `query`
    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<ListMessagesResponse>;

    /// Fetch a full message
    fn get_message(&self, id: &MessageId) -> Result<GmailMessage>;
}

/// Gmail API client; asks `tokens` for a bearer token on every request
pub struct GmailClient<T: TokenSource> {
    tokens: T,
    agent: ureq::Agent,
    base_url: String,
}

impl<T: TokenSource> GmailClient<T> {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";
    const PAGE_SIZE: usize = 500;
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(tokens: T) -> Self {
        Self::with_base_url(tokens, Self::BASE_URL)
    }

    pub fn with_base_url(tokens: T, base_url: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            tokens,
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn get_json<R: DeserializeOwned>(&self, url: &Url, what: &str) -> Result<R> {
        let access_token = self.tokens.current_token()?;

        let mut response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .map_err(|e| Error::from_transport(&format!("{} request failed", what), e))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::from_transport(&format!("failed to read {} response", what), e))?;

        if !status.is_success() {
            return Err(Error::Network(format!(
                "{} returned {}: {}",
                what,
                status.as_u16(),
                body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Network(format!("malformed {} response: {}", what, e)))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::Config(format!("invalid Gmail API URL: {}", e)))
    }
}

impl<T: TokenSource> MessageSource for GmailClient<T> {
    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<ListMessagesResponse> {
        let mut url = self.endpoint("/users/me/messages")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("maxResults", &Self::PAGE_SIZE.to_string());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        debug!("Listing messages: q={:?} page_token={:?}", query, page_token);
        self.get_json(&url, "list messages")
    }

    fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let mut url = self.endpoint(&format!(
            "/users/me/messages/{}",
            urlencoding::encode(id.as_str())
        ))?;
        url.query_pairs_mut().append_pair("format", "full");

        self.get_json(&url, "get message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;

    struct FixedToken;

    impl TokenSource for FixedToken {
        fn current_token(&self) -> Result<String> {
            Ok("tok-123".to_string())
        }
    }

    struct RevokedToken;

    impl TokenSource for RevokedToken {
        fn current_token(&self) -> Result<String> {
            Err(Error::Auth("revoked".to_string()))
        }
    }

    #[test]
    fn test_list_page_sends_query_and_token() {
        let server = StubServer::start(vec![(
            200,
            r#"{"messages":[{"id":"m1","threadId":"t1"}],"nextPageToken":"p2"}"#.to_string(),
        )]);
        let client = GmailClient::with_base_url(FixedToken, server.url());

        let page = client.list_page("after:2025/1/1", Some("p1")).unwrap();
        assert_eq!(page.messages.unwrap()[0].id, "m1");
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));

        let request = &server.requests()[0];
        assert_eq!(request.header("Authorization"), Some("Bearer tok-123"));
        assert!(request.target.starts_with("/users/me/messages?"));
        assert!(request.target.contains("q=after%3A2025%2F1%2F1"));
        assert!(request.target.contains("pageToken=p1"));
    }

    #[test]
    fn test_requests_carry_refreshed_token() {
        use super::super::auth::{Credential, CredentialManager, OAuthClient, OAuthEndpoints};
        use chrono::Utc;
        use std::sync::Arc;

        let token_server = StubServer::start(vec![(
            200,
            r#"{"access_token":"new-1","expires_in":3600}"#.to_string(),
        )]);
        let gmail_server = StubServer::start(vec![
            (200, r#"{"messages":[{"id":"m1","threadId":"t1"}]}"#.to_string()),
            (200, r#"{"resultSizeEstimate":0}"#.to_string()),
        ]);
        let oauth = OAuthClient::new(
            OAuthEndpoints {
                auth_url: format!("{}/auth", token_server.url()),
                token_url: format!("{}/token", token_server.url()),
            },
            Duration::from_secs(60),
        );
        let stale = Credential {
            access_token: "old-access".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: Utc::now() - chrono::Duration::seconds(5),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        let manager = Arc::new(CredentialManager::new(oauth, stale));
        let client = GmailClient::with_base_url(Arc::clone(&manager), gmail_server.url());

        client.list_page("after:2025/1/1", None).unwrap();
        client.list_page("after:2025/1/1", Some("p2")).unwrap();

        let requests = gmail_server.requests();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request.header("Authorization"), Some("Bearer new-1"));
        }
        assert_eq!(token_server.requests().len(), 1);
        assert_eq!(manager.credential().access_token, "new-1");
    }

    #[test]
    fn test_get_message_requests_full_format() {
        let server = StubServer::start(vec![(
            200,
            r#"{"id":"m1","threadId":"t1","payload":{"mimeType":"text/plain","body":{"data":"aGk"}}}"#
                .to_string(),
        )]);
        let client = GmailClient::with_base_url(FixedToken, server.url());

        let msg = client.get_message(&MessageId::new("m1")).unwrap();
        assert_eq!(msg.thread_id, "t1");
        assert_eq!(server.requests()[0].target, "/users/me/messages/m1?format=full");
    }

    #[test]
    fn test_error_status_is_network_error() {
        let server = StubServer::start(vec![(500, r#"{"error":"backend"}"#.to_string())]);
        let client = GmailClient::with_base_url(FixedToken, server.url());

        let err = client.list_page("after:2025/1/1", None).unwrap_err();
        assert!(matches!(err, Error::Network(ref msg) if msg.contains("500")));
    }

    #[test]
    fn test_token_failure_stops_before_request() {
        let server = StubServer::start(vec![]);
        let client = GmailClient::with_base_url(RevokedToken, server.url());

        let err = client.get_message(&MessageId::new("m1")).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(server.requests().is_empty());
    }
}

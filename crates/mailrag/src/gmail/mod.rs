//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 credential refresh and the loopback consent flow
//! - Gmail API client implementing [`MessageSource`]
//! - Paginated listing and body retrieval over any [`MessageSource`]
//! - MIME body selection and normalization to domain models

mod auth;
mod client;
mod consent;
mod fetch;
mod normalize;

pub use auth::{Credential, CredentialManager, OAuthClient, OAuthEndpoints, TokenSource};
pub use client::{GmailClient, MessageSource};
pub use consent::{AuthorizationGrant, CALLBACK_PATH, LoopbackConsent, acquire_initial_grant};
pub use fetch::{fetch_all, fetch_body, list_ids};
pub use normalize::{decode_body_data, normalize_message, select_plain_text};

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: String,
    }

    /// Full message from Gmail API
    #[derive(Debug, Clone, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: String,
        #[serde(default)]
        pub internal_date: Option<String>,
        pub payload: Option<MessagePart>,
    }

    /// A MIME part; the top-level payload uses the same shape
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub mime_type: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Part body, base64url encoded
    #[derive(Debug, Clone, Default, Deserialize, Serialize)]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
    }
}

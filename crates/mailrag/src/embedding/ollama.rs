//! Ollama-compatible embedding client
//!
//! One blocking `POST <base>/api/embeddings` per text, bounded by a 30 second
//! timeout. Retry policy belongs to the caller.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::error::{Error, Result};
use crate::models::Embedding;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<RequestOptions>,
}

#[derive(Serialize)]
struct RequestOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Embedding>,
}

pub struct OllamaClient {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    context_length: Option<u32>,
}

impl OllamaClient {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            context_length: None,
        }
    }

    /// Ask the model for a specific context window (`options.num_ctx`)
    pub fn with_context_length(mut self, context_length: Option<u32>) -> Self {
        self.context_length = context_length;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
            options: self.context_length.map(|num_ctx| RequestOptions { num_ctx }),
        };

        debug!("Embedding {} chars with {}", text.len(), self.model);
        let mut response = self
            .agent
            .post(&self.endpoint())
            .send_json(&request)
            .map_err(|e| Error::from_transport("embedding request failed", e))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::from_transport("failed to read embedding response", e))?;

        if status != 200 {
            return Err(Error::EmbeddingService {
                status: Some(status),
                body,
            });
        }

        let parsed: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|e| Error::EmbeddingService {
                status: Some(status),
                body: format!("unparseable response ({}): {}", e, body),
            })?;

        match parsed.embedding {
            Some(embedding) if !embedding.is_empty() => Ok(embedding),
            _ => Err(Error::EmbeddingService {
                status: Some(status),
                body: format!("response has no embedding: {}", body),
            }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;

    #[test]
    fn test_embed_posts_model_and_prompt() {
        let server = StubServer::start(vec![(200, r#"{"embedding":[0.5,-1.0,2.0]}"#.to_string())]);
        let client = OllamaClient::new(format!("{}/", server.url()), "nomic-embed-text");

        let embedding = client.embed("hello").unwrap();
        assert_eq!(embedding, vec![0.5, -1.0, 2.0]);

        let request = &server.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/api/embeddings");
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body, serde_json::json!({"model": "nomic-embed-text", "prompt": "hello"}));
    }

    #[test]
    fn test_context_length_sent_as_option() {
        let server = StubServer::start(vec![(200, r#"{"embedding":[1.0]}"#.to_string())]);
        let client = OllamaClient::new(server.url(), "m").with_context_length(Some(8192));

        client.embed("x").unwrap();
        let body: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
        assert_eq!(body["options"]["num_ctx"], 8192);
    }

    #[test]
    fn test_non_200_carries_status_and_body() {
        let server = StubServer::start(vec![(404, r#"{"error":"model not found"}"#.to_string())]);
        let client = OllamaClient::new(server.url(), "missing");

        match client.embed("x").unwrap_err() {
            Error::EmbeddingService { status, body } => {
                assert_eq!(status, Some(404));
                assert!(body.contains("model not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_embedding_field() {
        let server = StubServer::start(vec![(200, r#"{"other":1}"#.to_string())]);
        let client = OllamaClient::new(server.url(), "m");
        assert!(matches!(client.embed("x"), Err(Error::EmbeddingService { .. })));
    }

    #[test]
    fn test_unparseable_body() {
        let server = StubServer::start(vec![(200, "<html>proxy</html>".to_string())]);
        let client = OllamaClient::new(server.url(), "m");
        assert!(matches!(client.embed("x"), Err(Error::EmbeddingService { .. })));
    }
}

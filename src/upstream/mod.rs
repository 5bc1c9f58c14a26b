//! Upstream streaming chat client.
//!
//! Issues the outbound POST carrying the normalized message history to the
//! token-streaming backend and exposes the raw response body as a byte
//! stream. Framing of that stream into token lines lives in
//! [`crate::translate`]; this module only owns the HTTP exchange.

use bytes::Bytes;
use futures::Stream;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of the streaming chat endpoint, relative to the configured base URL.
pub const STREAM_PATH: &str = "/v1/chat/stream";

/// Longest upstream error body echoed back in an error message.
const BODY_EXCERPT_LIMIT: usize = 512;

/// Role of a message author in the upstream protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One message of the normalized history sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Serialize)]
struct UpstreamChatRequest<'a> {
    messages: &'a [UpstreamMessage],
}

/// Failure of the outbound upstream call. Never retried here.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("llm proxy error: {status} {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Client for the token-streaming chat backend.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl UpstreamClient {
    /// Create a client for the given base URL with an optional bearer token.
    #[must_use]
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn stream_url(&self) -> String {
        format!("{}{STREAM_PATH}", self.base_url)
    }

    /// POST the normalized history and return the raw response byte stream.
    ///
    /// A non-200 response is drained for an excerpt and surfaced as
    /// [`UpstreamError::Rejected`]; transport failures become
    /// [`UpstreamError::Unavailable`].
    pub async fn stream_chat(
        &self,
        messages: &[UpstreamMessage],
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>> + use<>, UpstreamError> {
        let mut request = self
            .http
            .post(self.stream_url())
            .header(header::ACCEPT, "text/event-stream")
            .json(&UpstreamChatRequest { messages });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                status,
                body: excerpt(&body),
            });
        }

        Ok(response.bytes_stream())
    }

    /// Forward a caller's raw body to the streaming endpoint verbatim.
    ///
    /// Used by the pass-through route; the response is handed back whole so
    /// the gateway can pipe its bytes 1:1 without reparsing.
    pub async fn forward_raw(
        &self,
        content_type: Option<String>,
        body: reqwest::Body,
    ) -> Result<reqwest::Response, UpstreamError> {
        let mut request = self
            .http
            .post(self.stream_url())
            .header(header::ACCEPT, "text/event-stream")
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                status,
                body: excerpt(&body),
            });
        }

        Ok(response)
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let message = UpstreamMessage {
            role: ChatRole::Assistant,
            content: "hi".to_string(),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = UpstreamClient::new("http://localhost:9000/", None);
        assert_eq!(client.stream_url(), "http://localhost:9000/v1/chat/stream");
    }

    #[test]
    fn test_blank_token_treated_as_absent() {
        let client = UpstreamClient::new("http://localhost:9000", Some("  ".to_string()));
        assert!(client.token.is_none());
    }

    #[test]
    fn test_excerpt_caps_long_bodies() {
        let long = "x".repeat(2048);
        assert_eq!(excerpt(&long).len(), 512);
        assert_eq!(excerpt("  short  "), "short");
    }
}

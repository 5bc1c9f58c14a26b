//! Stream translation: upstream token lines to gateway events.
//!
//! The upstream backend answers with SSE-framed token lines
//! (`data: <token>\n\n` ... `data: [DONE]\n\n`). This module frames the raw
//! byte stream into token payloads and folds them into the richer event
//! protocol the front end expects: an accumulator grows the assistant text
//! and every token becomes a [`StreamEvent::Delta`] carrying both the chunk
//! and the cumulative text so far.
//!
//! A turn that completes cleanly without a single token is reported as
//! [`TranslateError::EmptyUpstreamContent`] rather than an empty success;
//! the gateway surfaces it as an in-band terminal error.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;

use crate::events::{AssistantSnapshot, DeltaEvent, MessageRef, SENDER_ASSISTANT, StreamEvent};

/// Upstream terminal sentinel: signals clean end of the token stream.
pub const DONE_SENTINEL: &str = "[DONE]";

pub use crate::events::DATA_PREFIX;

/// Failure while consuming the upstream token stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("llm stream error: {0}")]
    Read(String),
    #[error("upstream produced no content")]
    EmptyUpstreamContent,
}

/// Frame an upstream byte stream into token payloads.
///
/// Lines are split on `\n`; blank lines and lines without the `data:` prefix
/// are skipped. The yielded payload is the text after the prefix with at most
/// one leading space removed (SSE colon-space stripping), so a token's own
/// leading whitespace survives into the accumulator. The stream ends on the
/// `[DONE]` sentinel, on EOF, or on the first read error. A trailing line
/// not terminated by a newline is discarded.
pub fn token_lines<S, E>(upstream: S) -> impl Stream<Item = Result<String, TranslateError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut buf: Vec<u8> = Vec::new();
        let mut done = false;

        futures::pin_mut!(upstream);
        while let Some(chunk) = upstream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(TranslateError::Read(e.to_string()));
                    return;
                }
            };
            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
                    continue;
                };
                let payload = rest.strip_prefix(' ').unwrap_or(rest);
                let token = payload.trim();
                if token.is_empty() {
                    continue;
                }
                if token == DONE_SENTINEL {
                    done = true;
                    break;
                }
                yield Ok(payload.to_string());
            }

            if done {
                return;
            }
        }
    }
}

/// Accumulation state of one streaming response.
///
/// Owns the linkage ids of the turn and the growing assistant text; each
/// token payload becomes one delta event, and [`Translator::finish`] decides
/// between the completed text and the empty-content condition.
#[derive(Debug)]
pub struct Translator {
    conversation_id: String,
    request_message_id: String,
    response_message_id: String,
    text: String,
    tokens: usize,
}

impl Translator {
    #[must_use]
    pub fn new(
        conversation_id: String,
        request_message_id: String,
        response_message_id: String,
    ) -> Self {
        Self {
            conversation_id,
            request_message_id,
            response_message_id,
            text: String::new(),
            tokens: 0,
        }
    }

    /// The creation announcement for this response message.
    #[must_use]
    pub fn created(&self) -> StreamEvent {
        StreamEvent::created(MessageRef {
            message_id: self.response_message_id.clone(),
            parent_message_id: self.request_message_id.clone(),
            conversation_id: self.conversation_id.clone(),
        })
    }

    /// Fold one token payload into the accumulator and build its delta event.
    ///
    /// The event's `text` field carries the trimmed chunk; the accumulator
    /// keeps the payload's own spacing.
    pub fn on_token(&mut self, payload: &str) -> StreamEvent {
        self.text.push_str(payload);
        self.tokens += 1;
        StreamEvent::Delta(DeltaEvent {
            message_id: self.response_message_id.clone(),
            conversation_id: self.conversation_id.clone(),
            parent_message_id: self.request_message_id.clone(),
            text: payload.trim().to_string(),
            message: AssistantSnapshot {
                message_id: self.response_message_id.clone(),
                conversation_id: self.conversation_id.clone(),
                parent_message_id: self.request_message_id.clone(),
                sender: SENDER_ASSISTANT.to_string(),
                text: self.text.clone(),
            },
        })
    }

    /// Text accumulated so far, also available after a mid-stream failure.
    #[must_use]
    pub fn partial_text(&self) -> &str {
        &self.text
    }

    /// Id of the response message announced by [`Translator::created`].
    #[must_use]
    pub fn response_message_id(&self) -> &str {
        &self.response_message_id
    }

    /// Complete the turn: the full text, or the empty-content condition when
    /// no delta was ever emitted.
    pub fn finish(self) -> Result<String, TranslateError> {
        if self.tokens == 0 {
            return Err(TranslateError::EmptyUpstreamContent);
        }
        Ok(self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_tokens(
        frames: Vec<Result<Bytes, String>>,
    ) -> Vec<Result<String, TranslateError>> {
        let stream = token_lines(futures::stream::iter(frames));
        futures::pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    fn ok(frame: &str) -> Result<Bytes, String> {
        Ok(Bytes::copy_from_slice(frame.as_bytes()))
    }

    #[tokio::test]
    async fn test_token_lines_basic() {
        let tokens = collect_tokens(vec![
            ok("data: Hello\n\n"),
            ok("data:  world\n\n"),
            ok("data: [DONE]\n\n"),
        ])
        .await;
        assert_eq!(
            tokens,
            vec![Ok("Hello".to_string()), Ok(" world".to_string())]
        );
    }

    #[tokio::test]
    async fn test_token_lines_split_across_chunks() {
        let tokens = collect_tokens(vec![
            ok("data: He"),
            ok("llo\n\ndata: [DO"),
            ok("NE]\n\n"),
        ])
        .await;
        assert_eq!(tokens, vec![Ok("Hello".to_string())]);
    }

    #[tokio::test]
    async fn test_token_lines_skips_noise() {
        let tokens = collect_tokens(vec![
            ok("event: ping\n\n"),
            ok(": keep-alive comment\n"),
            ok("data:\n"),
            ok("data:   \n"),
            ok("data: real\n\n"),
        ])
        .await;
        assert_eq!(tokens, vec![Ok("real".to_string())]);
    }

    #[tokio::test]
    async fn test_token_lines_stops_at_sentinel() {
        let tokens = collect_tokens(vec![ok("data: one\n\ndata: [DONE]\n\ndata: tail\n\n")]).await;
        assert_eq!(tokens, vec![Ok("one".to_string())]);
    }

    #[tokio::test]
    async fn test_token_lines_discards_trailing_partial_line() {
        let tokens = collect_tokens(vec![ok("data: whole\n\ndata: partial")]).await;
        assert_eq!(tokens, vec![Ok("whole".to_string())]);
    }

    #[tokio::test]
    async fn test_token_lines_surfaces_read_error() {
        let tokens = collect_tokens(vec![
            ok("data: Hi\n\n"),
            Err("connection reset".to_string()),
        ])
        .await;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], Ok("Hi".to_string()));
        assert_eq!(
            tokens[1],
            Err(TranslateError::Read("connection reset".to_string()))
        );
    }

    #[test]
    fn test_translator_golden_sequence() {
        let mut translator = Translator::new(
            "conv-1".to_string(),
            "req-1".to_string(),
            "res-1".to_string(),
        );

        let StreamEvent::Created(created) = translator.created() else {
            panic!("expected created event");
        };
        assert!(created.created);
        assert_eq!(created.message.message_id, "res-1");
        assert_eq!(created.message.parent_message_id, "req-1");

        let StreamEvent::Delta(first) = translator.on_token("Hello") else {
            panic!("expected delta event");
        };
        assert_eq!(first.text, "Hello");
        assert_eq!(first.message.text, "Hello");
        assert_eq!(first.message.sender, "Assistant");

        let StreamEvent::Delta(second) = translator.on_token(" world") else {
            panic!("expected delta event");
        };
        assert_eq!(second.text, "world");
        assert_eq!(second.message.text, "Hello world");
        assert_eq!(second.message_id, "res-1");
        assert_eq!(second.parent_message_id, "req-1");

        assert_eq!(translator.finish(), Ok("Hello world".to_string()));
    }

    #[test]
    fn test_translator_cumulative_grows_monotonically() {
        let mut translator = Translator::new(
            "c".to_string(),
            "r".to_string(),
            "m".to_string(),
        );
        let mut previous = 0;
        for token in ["a", "bb", "ccc"] {
            let StreamEvent::Delta(delta) = translator.on_token(token) else {
                panic!("expected delta event");
            };
            assert!(delta.message.text.len() > previous);
            previous = delta.message.text.len();
        }
        assert_eq!(translator.finish(), Ok("abbccc".to_string()));
    }

    #[test]
    fn test_translator_empty_completion() {
        let translator = Translator::new(
            "c".to_string(),
            "r".to_string(),
            "m".to_string(),
        );
        assert_eq!(translator.finish(), Err(TranslateError::EmptyUpstreamContent));
    }
}

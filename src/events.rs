//! Outbound streaming event model.
//!
//! This module defines the closed set of events the gateway emits to the
//! front end over a single SSE response: a creation announcement, incremental
//! deltas, one final summary, and the in-band terminal error. Each variant has
//! an explicit serialization contract; there are no free-form payload maps.
//!
//! # Wire format
//!
//! Every event is one frame `data: <json>\n\n`. The front end distinguishes
//! variants by the tagged booleans (`created`, `final`) and field shapes.
//!
//! # Example
//!
//! ```rust
//! use chat_gateway::events::{MessageRef, StreamEvent, sse_frame};
//!
//! let event = StreamEvent::created(MessageRef {
//!     message_id: "res-1".to_string(),
//!     parent_message_id: "req-1".to_string(),
//!     conversation_id: "conv-1".to_string(),
//! });
//! let frame = sse_frame(&event);
//! assert!(frame.starts_with("data: "));
//! assert!(frame.ends_with("\n\n"));
//! ```

use serde::{Deserialize, Serialize};

/// SSE event prefix, shared by the consumed and produced wire formats.
pub const DATA_PREFIX: &str = "data:";

/// Sender label for assistant-authored messages on the wire.
pub const SENDER_ASSISTANT: &str = "Assistant";

/// Sender label for user-authored messages on the wire.
pub const SENDER_USER: &str = "User";

/// Linkage of a message: its own id, its parent, and the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub message_id: String,
    pub parent_message_id: String,
    pub conversation_id: String,
}

/// Announces that a response message is in flight, before any content exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedEvent {
    pub created: bool,
    pub message: MessageRef,
}

/// Snapshot of the assistant message carried inside every delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSnapshot {
    pub message_id: String,
    pub conversation_id: String,
    pub parent_message_id: String,
    pub sender: String,
    /// Cumulative response text accumulated so far.
    pub text: String,
}

/// One incremental token, plus the cumulative assistant message so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeltaEvent {
    pub message_id: String,
    pub conversation_id: String,
    pub parent_message_id: String,
    /// The just-read token chunk.
    pub text: String,
    pub message: AssistantSnapshot,
}

/// A chat message as echoed in final and error events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub message_id: String,
    pub conversation_id: String,
    pub parent_message_id: String,
    pub sender: String,
    pub text: String,
    pub is_created_by_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

/// Conversation metadata carried by terminal events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMeta {
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_prefix: Option<String>,
}

/// Successful completion of one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalEvent {
    #[serde(rename = "final")]
    pub is_final: bool,
    pub conversation: ConversationMeta,
    pub request_message: EventMessage,
    pub response_message: EventMessage,
    pub messages: Vec<EventMessage>,
}

/// Terminal in-band error, emitted once the SSE stream has started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    #[serde(rename = "final")]
    pub is_final: bool,
    pub error: String,
    pub conversation_id: String,
    pub message_id: String,
    pub parent_message_id: String,
    pub conversation: ConversationMeta,
    pub request_message: EventMessage,
    pub response_message: EventMessage,
}

/// The closed set of events this gateway emits on the agent-chat stream.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StreamEvent {
    Created(CreatedEvent),
    Delta(DeltaEvent),
    Final(FinalEvent),
    Error(ErrorEvent),
}

/// Identity and metadata of one chat turn, fixed at ingress.
///
/// Collected once per request and threaded through event construction so the
/// terminal builders stay pure functions.
#[derive(Debug, Clone)]
pub struct TurnDescriptor {
    pub endpoint: String,
    pub model: String,
    pub prompt_prefix: String,
    pub conversation_id: String,
    pub request_message_id: String,
    pub parent_message_id: String,
    pub user_text: String,
}

impl TurnDescriptor {
    fn request_message(&self) -> EventMessage {
        EventMessage {
            message_id: self.request_message_id.clone(),
            conversation_id: self.conversation_id.clone(),
            parent_message_id: self.parent_message_id.clone(),
            sender: SENDER_USER.to_string(),
            text: self.user_text.clone(),
            is_created_by_user: true,
            error: None,
        }
    }
}

impl StreamEvent {
    /// Build the creation announcement for a response message.
    #[must_use]
    pub fn created(message: MessageRef) -> Self {
        Self::Created(CreatedEvent {
            created: true,
            message,
        })
    }

    /// Build the final event for a completed turn.
    #[must_use]
    pub fn final_turn(
        turn: &TurnDescriptor,
        response_message_id: &str,
        assistant_text: String,
    ) -> Self {
        let request_message = turn.request_message();
        let response_message = EventMessage {
            message_id: response_message_id.to_string(),
            conversation_id: turn.conversation_id.clone(),
            parent_message_id: turn.request_message_id.clone(),
            sender: SENDER_ASSISTANT.to_string(),
            text: assistant_text,
            is_created_by_user: false,
            error: None,
        };
        let conversation = ConversationMeta {
            conversation_id: turn.conversation_id.clone(),
            endpoint: Some(turn.endpoint.clone()),
            model: (!turn.model.is_empty()).then(|| turn.model.clone()),
            prompt_prefix: (!turn.prompt_prefix.is_empty()).then(|| turn.prompt_prefix.clone()),
        };
        Self::Final(FinalEvent {
            is_final: true,
            conversation,
            messages: vec![request_message.clone(), response_message.clone()],
            request_message,
            response_message,
        })
    }

    /// Build the terminal error event for a failed turn.
    ///
    /// The response message id is freshly generated by the caller; it is not
    /// tied to any id previously announced by a `Created` event.
    #[must_use]
    pub fn error_turn(turn: &TurnDescriptor, response_message_id: &str, error: &str) -> Self {
        let request_message = turn.request_message();
        let response_message = EventMessage {
            message_id: response_message_id.to_string(),
            conversation_id: turn.conversation_id.clone(),
            parent_message_id: turn.request_message_id.clone(),
            sender: SENDER_ASSISTANT.to_string(),
            text: error.to_string(),
            is_created_by_user: false,
            error: Some(true),
        };
        Self::Error(ErrorEvent {
            is_final: true,
            error: error.to_string(),
            conversation_id: turn.conversation_id.clone(),
            message_id: response_message_id.to_string(),
            parent_message_id: turn.request_message_id.clone(),
            conversation: ConversationMeta {
                conversation_id: turn.conversation_id.clone(),
                endpoint: None,
                model: None,
                prompt_prefix: None,
            },
            request_message,
            response_message,
        })
    }
}

/// Convert a [`StreamEvent`] to one SSE frame: `data: <json>\n\n`.
pub fn sse_frame(event: &StreamEvent) -> String {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({ "final": true, "error": e.to_string() }).to_string()
    });
    format!("{DATA_PREFIX} {json}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn() -> TurnDescriptor {
        TurnDescriptor {
            endpoint: "openai".to_string(),
            model: "gpt-4o".to_string(),
            prompt_prefix: String::new(),
            conversation_id: "conv-1".to_string(),
            request_message_id: "req-1".to_string(),
            parent_message_id: "00000000-0000-0000-0000-000000000000".to_string(),
            user_text: "Hi".to_string(),
        }
    }

    #[test]
    fn test_created_wire_shape() {
        let event = StreamEvent::created(MessageRef {
            message_id: "res-1".to_string(),
            parent_message_id: "req-1".to_string(),
            conversation_id: "conv-1".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"created\":true"));
        assert!(json.contains("\"messageId\":\"res-1\""));
        assert!(json.contains("\"parentMessageId\":\"req-1\""));
        assert!(json.contains("\"conversationId\":\"conv-1\""));
    }

    #[test]
    fn test_final_wire_shape() {
        let event = StreamEvent::final_turn(&turn(), "res-1", "Hello world".to_string());
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["final"], true);
        assert_eq!(value["conversation"]["endpoint"], "openai");
        assert_eq!(value["conversation"]["model"], "gpt-4o");
        assert!(value["conversation"].get("promptPrefix").is_none());
        assert_eq!(value["requestMessage"]["sender"], "User");
        assert_eq!(value["requestMessage"]["isCreatedByUser"], true);
        assert_eq!(value["responseMessage"]["text"], "Hello world");
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_error_wire_shape() {
        let event = StreamEvent::error_turn(&turn(), "res-err", "upstream unavailable");
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["final"], true);
        assert_eq!(value["error"], "upstream unavailable");
        assert_eq!(value["messageId"], "res-err");
        assert_eq!(value["parentMessageId"], "req-1");
        assert_eq!(value["responseMessage"]["error"], true);
        assert_eq!(value["requestMessage"]["text"], "Hi");
    }

    #[test]
    fn test_sse_frame_format() {
        let event = StreamEvent::created(MessageRef {
            message_id: "a".to_string(),
            parent_message_id: "b".to_string(),
            conversation_id: "c".to_string(),
        });
        let frame = sse_frame(&event);
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
    }
}

//! Inbound chat payload types and history normalization.
//!
//! The agent-chat route accepts the front end's message format: messages
//! carry a free-form `sender`, an optional `role`, a `text` field, and typed
//! content parts. This module resolves each message to an upstream role,
//! computes its effective text, and builds the ordered history forwarded to
//! the streaming backend.

pub mod ids;

use serde::Deserialize;

use crate::upstream::{ChatRole, UpstreamMessage};

/// Inbound agent-chat request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentChatPayload {
    pub endpoint: String,
    pub endpoint_type: String,
    pub conversation_id: String,
    pub message_id: String,
    pub parent_message_id: String,
    pub text: String,
    pub prompt_prefix: String,
    pub model: String,
    pub messages: Vec<AgentMessage>,
    pub additional_context: serde_json::Value,
}

/// One historical message as sent by the front end.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentMessage {
    pub message_id: String,
    pub conversation_id: String,
    pub parent_message_id: String,
    pub sender: String,
    pub role: String,
    pub text: String,
    pub is_created_by_user: bool,
    pub content: Vec<MessageContentPart>,
}

/// A typed content fragment. Only `text` parts are consumed today.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<ContentValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentValue {
    pub value: String,
}

/// Resolve the upstream role of a history message.
///
/// Precedence: explicit `role`, then `sender`, then the `isCreatedByUser`
/// flag, defaulting to assistant.
#[must_use]
pub fn resolve_role(message: &AgentMessage) -> ChatRole {
    match message.role.to_lowercase().as_str() {
        "assistant" => return ChatRole::Assistant,
        "tool" => return ChatRole::Tool,
        "system" => return ChatRole::System,
        "user" => return ChatRole::User,
        _ => {}
    }
    match message.sender.to_lowercase().as_str() {
        "assistant" | "bot" | "system" => return ChatRole::Assistant,
        "user" => return ChatRole::User,
        _ => {}
    }
    if message.is_created_by_user {
        return ChatRole::User;
    }
    ChatRole::Assistant
}

/// Effective text of a message: the `text` field when non-blank, otherwise
/// the concatenation of its text-type content parts.
#[must_use]
pub fn effective_text(message: &AgentMessage) -> String {
    let text = message.text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    join_content(&message.content).trim().to_string()
}

fn join_content(parts: &[MessageContentPart]) -> String {
    let mut joined = String::new();
    for part in parts {
        if part.kind != "text" {
            continue;
        }
        if let Some(text) = &part.text {
            joined.push_str(&text.value);
        }
    }
    joined
}

/// Find the newest user-authored message with non-empty effective text.
///
/// Used when the payload's own `text` field is blank.
#[must_use]
pub fn extract_latest_user_text(messages: &[AgentMessage]) -> String {
    for message in messages.iter().rev() {
        if resolve_role(message) == ChatRole::User {
            let text = effective_text(message);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Build the ordered history for the upstream request.
///
/// Messages with empty effective text are skipped; the latest user text is
/// always appended as the closing user message.
#[must_use]
pub fn build_upstream_messages(history: &[AgentMessage], latest_user: &str) -> Vec<UpstreamMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    for message in history {
        let text = effective_text(message);
        if text.is_empty() {
            continue;
        }
        messages.push(UpstreamMessage {
            role: resolve_role(message),
            content: text,
        });
    }
    messages.push(UpstreamMessage {
        role: ChatRole::User,
        content: latest_user.to_string(),
    });
    messages
}

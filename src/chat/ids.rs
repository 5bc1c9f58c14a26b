//! Identifier generation and conversation/message id normalization.
//!
//! Ids are random version-4 UUID strings. Conversation ids arriving from the
//! client may be blank or carry one of the placeholder values the front end
//! sends for a not-yet-created conversation; both force generation of a fresh
//! id. Message ids are only generated when absent.

use uuid::Uuid;

/// Parent id of a conversation root: the all-zero sentinel means "no parent".
pub const NO_PARENT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Conversation-id placeholder sent by the client for a brand-new chat.
pub const PLACEHOLDER_NEW: &str = "new";

/// Conversation-id placeholder produced by serializing an absent id.
pub const PLACEHOLDER_NULL: &str = "null";

/// Generate a random 128-bit identifier as a hyphenated version-4 UUID string.
#[must_use]
pub fn generate_id() -> String {
    // Uuid::new_v4 draws from the OS entropy source and sets the version and
    // variant bits itself. An entropy read failure aborts the process, so
    // there is no recoverable path to hook a degraded time-derived id on.
    Uuid::new_v4().to_string()
}

/// Normalize a client-supplied conversation id.
///
/// Blank input and the `"new"`/`"null"` placeholders yield a freshly generated
/// id; anything else is returned trimmed and otherwise unchanged.
#[must_use]
pub fn normalize_conversation_id(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == PLACEHOLDER_NEW || trimmed == PLACEHOLDER_NULL {
        return generate_id();
    }
    trimmed.to_string()
}

/// Return the trimmed id, generating a fresh one when the input is blank.
#[must_use]
pub fn ensure_id(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return generate_id();
    }
    trimmed.to_string()
}

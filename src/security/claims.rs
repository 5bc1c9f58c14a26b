use serde::{Deserialize, Serialize};

/// Verified caller identity returned by the auth delegate.
///
/// Lifetime is one request: claims are attached to the request extensions
/// for logging and auditing, never persisted, and gate no authorization
/// decisions in this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub username: String,
    pub email: String,
}

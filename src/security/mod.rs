//! Caller authentication and admission control.
//!
//! Authentication is delegated: the gateway never issues or decodes tokens
//! itself, it forwards the caller's bearer token to an external profile
//! endpoint and trusts the identity that comes back. Admission control is a
//! per-caller sliding-window limiter. Both are optional-by-configuration;
//! with no delegate endpoint configured the protected routes run in open
//! mode.

pub mod claims;
pub mod delegate;
pub mod middleware;
pub mod rate_limit;

pub use claims::Claims;
pub use delegate::{AuthDelegate, AuthError};
pub use rate_limit::SlidingWindowLimiter;

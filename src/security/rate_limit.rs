//! Per-caller sliding-window admission control.
//!
//! Each caller key (client IP) owns an ordered list of request timestamps.
//! One check prunes entries older than the window, rejects if the remainder
//! is at the limit, and records the new request otherwise — all inside a
//! single critical section so check-and-record stays atomic. State is
//! process-local and resets on restart.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::server::ApiError;

/// Sliding-window request counter keyed by caller.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
    limit: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Admit or reject one request for `key`.
    ///
    /// Rejected requests are not recorded; they do not extend the window.
    pub fn allow(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();

        let requests = windows.entry(key.to_string()).or_default();
        requests.retain(|at| now.duration_since(*at) < self.window);

        if requests.len() >= self.limit {
            return false;
        }
        requests.push(now);
        true
    }
}

/// Caller key for admission control: the client IP.
///
/// Prefers the first `X-Forwarded-For` entry, then the peer address; a fixed
/// fallback key keeps the limiter total rather than open when neither is
/// available.
pub fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// Middleware enforcing the general limiter on every route.
pub async fn admit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    if !state.general_limiter.allow(&key) {
        tracing::warn!(name: "admission.rejected", caller = %key, "request rate limited");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }
    next.run(req).await
}

//! Streaming chat gateway.
//!
//! A protocol-translation gateway for a chat product: it accepts a chat turn
//! from the front end, authenticates the caller by delegating to an external
//! identity service, forwards the normalized conversation to a token-streaming
//! upstream, and re-emits that token stream as the richer stateful event
//! protocol the front end expects — all over one long-lived, flush-per-event
//! SSE response, cancellable mid-flight.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **Translation**: upstream `data:` token lines folded into
//!   created/delta/final/error events with a cumulative-text accumulator
//! - **Security**: delegated bearer verification plus per-caller
//!   sliding-window admission control
//!
//! # Modules
//!
//! - [`chat`]: inbound payload types, role and history normalization, ids
//! - [`upstream`]: streaming client for the token backend
//! - [`translate`]: token framing and the accumulation state machine
//! - [`events`]: the closed outbound event model
//! - [`security`]: auth delegation and admission control

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod chat;
pub mod config;
pub mod events;
pub mod security;
pub mod server;
pub mod translate;
pub mod upstream;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::security::{AuthDelegate, SlidingWindowLimiter};
use crate::upstream::UpstreamClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Global configuration.
    pub config: Arc<AppConfig>,
    /// Streaming upstream client; absent when no endpoint is configured.
    pub upstream: Option<Arc<UpstreamClient>>,
    /// Auth delegate; absent means open mode.
    pub auth: Option<Arc<AuthDelegate>>,
    /// Stricter limiter for the authenticated chat routes.
    pub auth_limiter: Arc<SlidingWindowLimiter>,
    /// Looser limiter applied to every route.
    pub general_limiter: Arc<SlidingWindowLimiter>,
}

impl AppState {
    /// Assemble the state owned by one server instance.
    pub fn from_config(config: Arc<AppConfig>) -> reqwest::Result<Self> {
        let upstream = config.upstream.enabled().then(|| {
            Arc::new(UpstreamClient::new(
                &config.upstream.base_url,
                Some(config.upstream.token.clone()),
            ))
        });

        let auth = if config.auth.enabled() {
            Some(Arc::new(AuthDelegate::new(config.auth.profile_url())?))
        } else {
            None
        };

        let auth_limiter = Arc::new(SlidingWindowLimiter::new(
            config.limits.auth_limit,
            Duration::from_secs(config.limits.auth_window_secs),
        ));
        let general_limiter = Arc::new(SlidingWindowLimiter::new(
            config.limits.general_limit,
            Duration::from_secs(config.limits.general_window_secs),
        ));

        Ok(Self {
            config,
            upstream,
            auth,
            auth_limiter,
            general_limiter,
        })
    }
}

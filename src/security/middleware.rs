//! Bearer authentication middleware for the chat route group.
//!
//! With no delegate configured the group runs in open mode and requests pass
//! through untouched. Otherwise the stricter admission limiter is consulted
//! first, then the `Authorization` header is parsed and the token verified by
//! delegation; verified claims land in the request extensions for logging.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::server::ApiError;

use super::rate_limit::client_key;

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(delegate) = state.auth.clone() else {
        // Open mode: no delegate endpoint configured.
        return next.run(req).await;
    };

    let key = client_key(&req);
    if !state.auth_limiter.allow(&key) {
        tracing::warn!(name: "admission.rejected", caller = %key, "auth route rate limited");
        return ApiError::too_many_requests(
            "Too many authentication attempts. Please try again in a minute.",
        )
        .into_response();
    }

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let mut parts = auth_header.split_whitespace();
    let token = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => token,
        _ => return ApiError::unauthorized("Authorization header is required").into_response(),
    };

    match delegate.verify(token).await {
        Ok(claims) => {
            tracing::debug!(
                name: "auth.verified",
                subject = %claims.subject,
                username = %claims.username,
                "caller verified"
            );
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(name: "auth.rejected", error = %e, "token verification failed");
            ApiError::unauthorized("Invalid or expired token").into_response()
        }
    }
}

//! HTTP entry point: router, middleware stack, and the two streaming routes.
//!
//! The error model has a hard phase boundary. Before the response stream is
//! handed to the client, failures are ordinary HTTP statuses ([`ApiError`]).
//! Once the agent-chat generator is returned, the status is fixed at 200 and
//! every later failure is surfaced as one in-band terminal error event. The
//! boundary is structural: handler code can return `ApiError`, generator code
//! can only yield frames.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::chat::{self, AgentChatPayload, ids};
use crate::config::{AppConfig, ServerConfig};
use crate::events::{StreamEvent, TurnDescriptor, sse_frame};
use crate::security::{self, Claims};
use crate::translate::{self, Translator};
use crate::upstream::{UpstreamClient, UpstreamError, UpstreamMessage};

/// Largest accepted request body.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = AppState::from_config(Arc::clone(&config))?;

    info!(
        name: "gateway.config.loaded",
        upstream_configured = config.upstream.enabled(),
        auth_enabled = config.auth.enabled(),
        "gateway configuration loaded"
    );

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    let chat_routes = Router::new()
        .route(
            "/orchestrator/v1/sessions/{session_id}/messages/stream",
            post(session_stream),
        )
        .route("/api/agents/chat/{endpoint}", post(agent_chat))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            security::middleware::require_auth,
        ));

    Router::new()
        .route("/orchestrator/v1/healthz", get(healthz))
        .merge(chat_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::rate_limit::admit,
        ))
        .layer(cors_layer(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300));

    let origin = server.allowed_origins.trim();
    if origin.is_empty() || origin == "*" {
        return cors.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value).allow_credentials(true),
        Err(_) => {
            tracing::warn!(origin = %origin, "invalid allowed origin, allowing any");
            cors.allow_origin(Any)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error model (pre-stream phase)
// ─────────────────────────────────────────────────────────────────────────────

/// JSON body of a pre-stream rejection.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub code: u16,
}

/// An ordinary HTTP rejection, only usable before the stream starts.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_exceeded",
            message,
        )
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "not_configured", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error.to_string(),
            message: self.message,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Pass-through stream: pipe the upstream SSE bytes back 1:1.
///
/// No protocol translation happens here, so upstream failures stay plain
/// HTTP errors.
async fn session_stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let Some(upstream) = state.upstream.clone() else {
        tracing::warn!(name: "upstream.missing", "LLM upstream not configured");
        return Err(ApiError::service_unavailable("LLM upstream not configured"));
    };

    let subject = req
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.subject.clone());
    info!(
        name: "stream.passthrough.start",
        session_id = %session_id,
        subject = subject.as_deref().unwrap_or(""),
        "starting SSE pass-through"
    );

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let body = reqwest::Body::wrap_stream(req.into_body().into_data_stream());

    let response = upstream
        .forward_raw(content_type, body)
        .await
        .map_err(|e| match e {
            UpstreamError::Unavailable(_) => ApiError::bad_gateway("upstream unavailable"),
            UpstreamError::Rejected { status, .. } => {
                ApiError::bad_gateway(format!("upstream error: {status}"))
            }
        })?;

    Ok(sse_response(Body::from_stream(response.bytes_stream())))
}

/// Agent chat: the full translation pipeline.
async fn agent_chat(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    // Service availability is checked before the body is touched.
    let Some(upstream) = state.upstream.clone() else {
        return Err(ApiError::service_unavailable("LLM upstream not configured"));
    };

    let bytes = axum::body::to_bytes(req.into_body(), BODY_LIMIT)
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?;
    let mut payload: AgentChatPayload = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?;

    if payload.endpoint.is_empty() {
        payload.endpoint = endpoint;
    }

    let conversation_id = ids::normalize_conversation_id(&payload.conversation_id);
    let request_message_id = ids::ensure_id(&payload.message_id);
    let parent_message_id = if payload.parent_message_id.is_empty() {
        ids::NO_PARENT_ID.to_string()
    } else {
        payload.parent_message_id.clone()
    };

    let mut user_text = payload.text.trim().to_string();
    if user_text.is_empty() {
        user_text = chat::extract_latest_user_text(&payload.messages);
    }
    if user_text.is_empty() {
        return Err(ApiError::bad_request("missing message text"));
    }

    let messages = chat::build_upstream_messages(&payload.messages, &user_text);
    if messages.is_empty() {
        return Err(ApiError::bad_request(
            "no messages available for the upstream request",
        ));
    }

    info!(
        name: "agent_chat.start",
        endpoint = %payload.endpoint,
        conversation_id = %conversation_id,
        history_len = payload.messages.len(),
        "starting agent chat turn"
    );

    let turn = TurnDescriptor {
        endpoint: payload.endpoint,
        model: payload.model,
        prompt_prefix: payload.prompt_prefix,
        conversation_id,
        request_message_id,
        parent_message_id,
        user_text,
    };

    Ok(sse_response(Body::from_stream(agent_turn_stream(
        upstream, messages, turn,
    ))))
}

/// The post-stream phase of one agent-chat turn.
///
/// Dropping the returned stream (client disconnect) cancels the in-flight
/// upstream call; nothing further is emitted and cancellation is not an
/// error.
fn agent_turn_stream(
    upstream: Arc<UpstreamClient>,
    messages: Vec<UpstreamMessage>,
    turn: TurnDescriptor,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        let byte_stream = match upstream.stream_chat(&messages).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(name: "upstream.failed", error = %e, "upstream call failed");
                yield Ok::<Bytes, Infallible>(frame(&StreamEvent::error_turn(&turn, &ids::generate_id(), &e.to_string())));
                return;
            }
        };

        let mut translator = Translator::new(
            turn.conversation_id.clone(),
            turn.request_message_id.clone(),
            ids::generate_id(),
        );
        yield Ok(frame(&translator.created()));

        let tokens = translate::token_lines(byte_stream);
        futures::pin_mut!(tokens);
        while let Some(token) = tokens.next().await {
            match token {
                Ok(payload) => {
                    yield Ok(frame(&translator.on_token(&payload)));
                }
                Err(e) => {
                    tracing::warn!(
                        name: "stream.read_failed",
                        error = %e,
                        partial_len = translator.partial_text().len(),
                        "upstream stream failed mid-flight"
                    );
                    yield Ok(frame(&StreamEvent::error_turn(&turn, &ids::generate_id(), &e.to_string())));
                    return;
                }
            }
        }

        let response_message_id = translator.response_message_id().to_string();
        match translator.finish() {
            Ok(text) => {
                yield Ok(frame(&StreamEvent::final_turn(&turn, &response_message_id, text)));
            }
            Err(e) => {
                tracing::warn!(name: "stream.empty", error = %e, "upstream completed without content");
                yield Ok(frame(&StreamEvent::error_turn(&turn, &ids::generate_id(), &e.to_string())));
            }
        }
    }
}

fn frame(event: &StreamEvent) -> Bytes {
    Bytes::from(sse_frame(event))
}

/// Streaming response skeleton: SSE headers, flush-per-event body.
fn sse_response(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

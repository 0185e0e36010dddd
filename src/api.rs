//! HTTP API: session lifecycle endpoints, status polling, and message sending.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Instant;
use tracing::{error, info};
use wabridge_core::{config::ApiConfig, error::SessionError};
use wabridge_session::SessionManager;

use crate::page::INDEX_HTML;

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    session: SessionManager,
    api_key: Option<String>,
    uptime: Instant,
}

impl ApiState {
    pub fn new(session: SessionManager, config: &ApiConfig) -> Self {
        let api_key = if config.api_key.is_empty() {
            None
        } else {
            Some(config.api_key.clone())
        };
        Self {
            session,
            api_key,
            uptime: Instant::now(),
        }
    }
}

/// Query parameters of `GET /send-message`.
#[derive(Debug, Deserialize)]
struct SendParams {
    phone: Option<String>,
    message: Option<String>,
}

/// Constant-time string comparison to prevent timing attacks on API token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `Err(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Result<(), ApiError> {
    let Some(key) = api_key else {
        return Ok(());
    };

    let unauthorized = |msg: &str| (StatusCode::UNAUTHORIZED, Json(json!({"error": msg})));

    let value = headers
        .get("authorization")
        .ok_or_else(|| unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("invalid Authorization header"))?;

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => Ok(()),
        _ => Err(unauthorized("invalid token")),
    }
}

/// Map a session error to an HTTP response. Send failures are logged with
/// their cause and answered with a generic message.
fn session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::Validation(msg) => (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))),
        SessionError::NotReady => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "WhatsApp client is not ready yet, please wait"})),
        ),
        SessionError::SendFailed(cause) => {
            error!("send-message failed: {cause}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to send message"})),
            )
        }
        other => {
            error!("unexpected session error: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            )
        }
    }
}

/// `GET /` — HTML page with the polling loop.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /health` — Liveness with uptime and session state. Never requires auth.
async fn health(State(state): State<ApiState>) -> Json<Value> {
    let snap = state.session.status();
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "session": snap.state,
        "generation": snap.generation,
        "ready_since": snap.ready_since,
    }))
}

/// `GET /info` — Process diagnostics. Never requires auth.
async fn process_info(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "pid": std::process::id(),
        "uptime_secs": state.uptime.elapsed().as_secs(),
    }))
}

/// `GET /initialize` — Start (or restart) the WhatsApp session.
async fn initialize(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let outcome = state.session.initialize().await;
    Ok(Json(json!({
        "message": outcome.message,
        "accepted": outcome.accepted,
    })))
}

/// `GET /close` — Tear the session down. Safe to call repeatedly.
async fn close(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let outcome = state.session.close().await;
    Ok(Json(json!({"message": outcome.message})))
}

/// `GET /status` — Snapshot for pollers.
async fn status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;
    let snap = state.session.status();
    Ok(Json(json!({
        "ready": snap.ready,
        "qrCode": snap.qr_code,
        "state": snap.state,
        "error": snap.error,
    })))
}

/// `GET /send-message?phone=..&message=..` — Send one text message.
async fn send_message(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Query(params): Query<SendParams>,
) -> Result<Json<Value>, ApiError> {
    check_auth(&headers, &state.api_key)?;

    let phone = params.phone.unwrap_or_default();
    let message = params.message.unwrap_or_default();
    let ack = state
        .session
        .send_message(&phone, &message)
        .await
        .map_err(session_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Message sent successfully",
        "id": ack.message_id,
    })))
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/info", get(process_info))
        .route("/initialize", get(initialize))
        .route("/close", get(close))
        .route("/status", get(status))
        .route("/send-message", get(send_message))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    config: &ApiConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

//! REST surface and its error envelope.
//!
//! Handlers never see lifecycle failures: the manager recovers those
//! internally. Only per-request outcomes (validation, channel-unavailable,
//! recipient-not-found, transient send failure) reach the wire.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use otpgate_core::{otp, phone};
use otpgate_session::SessionHandle;

use crate::manager::ConnectionManager;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: ConnectionManager,
    pub api_key: Arc<str>,
}

/// Per-request failures, mapped onto the wire contract.
#[derive(Debug)]
pub enum ApiError {
    /// 400: a required field is absent. Never retried by callers.
    MissingField(&'static str),
    /// 503: the outbound channel is not usable right now. Carries enough
    /// state for the caller to decide between prompting for a QR scan and
    /// simply waiting.
    ChannelUnavailable { has_valid_auth: bool },
    /// 404: the recipient is not registered on the network.
    RecipientNotFound,
    /// 500: the operation itself failed after the gate passed.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": format!("{field} is required"),
                })),
            )
                .into_response(),
            Self::ChannelUnavailable { has_valid_auth } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Messaging channel is not available. Scan the QR code to authenticate.",
                    "hasValidAuth": has_valid_auth,
                    "needsQR": !has_valid_auth,
                })),
            )
                .into_response(),
            Self::RecipientNotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "error": "This number is not registered on the network",
                })),
            )
                .into_response(),
            Self::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Internal server error",
                    "details": details,
                })),
            )
                .into_response(),
        }
    }
}

/// Build the full router. Every route except `/qr-view` requires the API key.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/status", get(status))
        .route("/qr", get(qr))
        .route("/send-otp", post(send_otp))
        .route("/send-message", post(send_message))
        .route("/check-number", post(check_number))
        .route("/restart", post(restart))
        .route("/reconnect", post(reconnect))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(protected)
        .route("/qr-view", get(qr_view))
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());
    if provided == Some(state.api_key.as_ref()) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "error": "Invalid or missing API key",
            })),
        )
            .into_response()
    }
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.manager.status().await;
    let auth = state.manager.auth();
    Json(json!({
        "connected": snapshot.record.is_connected,
        "hasQR": snapshot.has_qr,
        "lastConnected": snapshot.record.last_connected_at,
        "phoneNumber": snapshot.record.identity,
        "sessionId": snapshot.record.session_id,
        "hasValidAuth": auth.is_valid(),
        "authFolderExists": auth.folder_exists(),
        "socketActive": snapshot.socket_active,
        "realTimeConnected": snapshot.real_time_connected,
        "timestamp": Utc::now(),
    }))
}

async fn qr(State(state): State<AppState>) -> Response {
    if let Some(code) = state.manager.pending_qr() {
        return Json(json!({
            "qr": code,
            "message": "Scan this QR code to authenticate",
        }))
        .into_response();
    }
    if state.manager.record().is_connected {
        return Json(json!({
            "connected": true,
            "message": "Session is already connected",
        }))
        .into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "QR code not available",
            "hasValidAuth": state.manager.auth().is_valid(),
        })),
    )
        .into_response()
}

async fn qr_view(State(state): State<AppState>) -> Html<String> {
    match state.manager.pending_qr() {
        Some(code) => Html(format!(
            "<!doctype html><html><body>\
             <h2>Scan this QR code to authenticate</h2>\
             <pre>{}</pre>\
             <p>Open the app &gt; Linked devices &gt; Scan QR code</p>\
             <button onclick=\"location.reload()\">Refresh</button>\
             </body></html>",
            escape_html(&code)
        )),
        None => Html(
            "<!doctype html><html><body>\
             <h2>QR code not available. Please wait or refresh.</h2>\
             <button onclick=\"location.reload()\">Refresh</button>\
             </body></html>"
                .to_string(),
        ),
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendOtpRequest {
    phone_number: Option<String>,
    message: Option<String>,
    otp_length: Option<u64>,
}

async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let phone_number = require_field(request.phone_number, "phoneNumber")?;
    let handle = ensure_channel(&state).await?;

    let lookup = handle
        .exists_on_network(&phone_number)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !lookup.exists {
        return Err(ApiError::RecipientNotFound);
    }

    let code = otp::generate_otp(otp::sanitize_length(request.otp_length));
    let body = otp::render_message(request.message.as_deref(), &code);
    let jid = phone::to_jid(&phone_number);
    let sent = handle
        .send_text(&jid, &body)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(phone_number = %phone_number, message_id = %sent.message_id, "OTP sent");

    Ok(Json(json!({
        "success": true,
        "message": "OTP sent",
        "data": {
            "otp": code,
            "phoneNumber": phone_number,
            "messageId": sent.message_id,
            "timestamp": Utc::now(),
        },
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    phone_number: Option<String>,
    message: Option<String>,
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let phone_number = require_field(request.phone_number, "phoneNumber")?;
    let message = require_field(request.message, "message")?;
    let handle = ensure_channel(&state).await?;

    let lookup = handle
        .exists_on_network(&phone_number)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !lookup.exists {
        return Err(ApiError::RecipientNotFound);
    }

    let jid = phone::to_jid(&phone_number);
    let sent = handle
        .send_text(&jid, &message)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(phone_number = %phone_number, message_id = %sent.message_id, "message sent");

    Ok(Json(json!({
        "success": true,
        "message": "Message sent",
        "data": {
            "phoneNumber": phone_number,
            "messageId": sent.message_id,
            "timestamp": Utc::now(),
        },
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckNumberRequest {
    phone_number: Option<String>,
}

async fn check_number(
    State(state): State<AppState>,
    Json(request): Json<CheckNumberRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let phone_number = require_field(request.phone_number, "phoneNumber")?;
    let handle = ensure_channel(&state).await?;

    let lookup = handle
        .exists_on_network(&phone_number)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "phoneNumber": phone_number,
            "exists": lookup.exists,
            "jid": lookup.jid,
        },
    })))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RestartRequest {
    clear_auth: bool,
}

async fn restart(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Lenient body handling: an absent or malformed body never triggers the
    // destructive clear-auth path.
    let request: RestartRequest = if body.is_empty() {
        RestartRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };
    state
        .manager
        .restart(request.clear_auth)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Session restart scheduled",
    })))
}

async fn reconnect(State(state): State<AppState>) -> Json<serde_json::Value> {
    let _ = state.manager.start_connect();
    Json(json!({
        "success": true,
        "message": "Reconnect scheduled",
    }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Route not found",
        })),
    )
        .into_response()
}

fn require_field(value: Option<String>, name: &'static str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::MissingField(name)),
    }
}

/// The status gate: consulted immediately before every outbound operation.
/// The returned handle may still fail mid-send; that is reported as a
/// transient failure, not a fatal condition.
async fn ensure_channel(state: &AppState) -> Result<Arc<dyn SessionHandle>, ApiError> {
    let unavailable = || ApiError::ChannelUnavailable {
        has_valid_auth: state.manager.auth().is_valid(),
    };
    if !state.manager.can_send_now().await {
        return Err(unavailable());
    }
    state.manager.handle_snapshot().ok_or_else(unavailable)
}

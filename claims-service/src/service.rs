use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use claims_flow::{ClaimsStore, Conversation, FlowError, TurnResult, TurnRunner};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use uuid::Uuid;

use crate::claims_api;

pub type ApiResult<T> = Result<Json<T>, ApiError>;
pub type ApiError = (StatusCode, Json<Value>);

pub fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

pub fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

pub fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub runner: TurnRunner,
    pub store: ClaimsStore,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub session_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub session_id: Uuid,
    pub turn: TurnResult,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/execute", post(execute_turn))
        .route("/session/{id}", get(get_session).delete(delete_session))
        .merge(claims_api::router())
        .layer(from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn health_check() -> &'static str {
    "OK"
}

async fn execute_turn(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<ExecuteResponse> {
    info!(
        session_id = ?request.session_id,
        content_length = request.content.len(),
        "Processing execute request"
    );

    let session_id = match request.session_id.as_deref() {
        Some(raw) => Uuid::parse_str(raw).map_err(|_| {
            error!(session_id = %raw, "Invalid session ID format");
            bad_request_error("Invalid session ID format")
        })?,
        None => state.runner.start_session().await.map_err(|e| {
            error!(error = %e, "Failed to create session");
            internal_error("Failed to create session", &e.to_string())
        })?,
    };

    let turn = state
        .runner
        .run(session_id, &request.content)
        .await
        .map_err(|e| match e {
            FlowError::SessionNotFound(id) => {
                error!(session_id = %id, "Session not found");
                not_found_error("Session not found", &id)
            }
            other => {
                error!(session_id = %session_id, error = %other, "Failed to run turn");
                internal_error("Failed to run turn", &other.to_string())
            }
        })?;

    info!(
        session_id = %session_id,
        success = turn.is_success(),
        "Request completed"
    );
    Ok(Json(ExecuteResponse { session_id, turn }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Conversation> {
    let session_id =
        Uuid::parse_str(&raw_id).map_err(|_| bad_request_error("Invalid session ID format"))?;

    match state.runner.conversation(session_id).await {
        Ok(conversation) => Ok(Json(conversation)),
        Err(FlowError::SessionNotFound(id)) => {
            info!(session_id = %id, "Session not found");
            Err(not_found_error("Session not found", &id))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            Err(internal_error("Failed to get session", &e.to_string()))
        }
    }
}

async fn delete_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id =
        Uuid::parse_str(&raw_id).map_err(|_| bad_request_error("Invalid session ID format"))?;

    match state.runner.end_session(session_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(FlowError::SessionNotFound(id)) => {
            info!(session_id = %id, "Session not found");
            Err(not_found_error("Session not found", &id))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to delete session");
            Err(internal_error("Failed to delete session", &e.to_string()))
        }
    }
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::Level;

use x402_observability::{emit_event, ObservabilityEvent, ProcessKind};
use x402_types::{ErrorEnvelope, ErrorKind, TaskRequest};

use crate::state::AppState;

/// Never logged or persisted directly — `secrets` is stripped before this
/// struct is debug-formatted anywhere.
fn redact_request_for_log(request: &TaskRequest) -> serde_json::Value {
    let secrets = request.secrets.as_ref().map(|secrets| {
        secrets
            .iter()
            .map(|(k, v)| (k.clone(), x402_observability::redact_text(&v.to_string())))
            .collect::<std::collections::HashMap<_, _>>()
    });
    serde_json::json!({
        "task_description": request.task_description,
        "context": request.context,
        "secrets": secrets,
    })
}

pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> Response {
    emit_event(
        Level::INFO,
        ProcessKind::Seller,
        ObservabilityEvent {
            event: "execute_received",
            component: "server",
            task_id: None,
            agent_id: None,
            status: Some("accepted"),
            error_code: None,
            detail: Some(&redact_request_for_log(&request).to_string()),
        },
    );
    let task = state.execution.create_task(request, None).await;
    (StatusCode::ACCEPTED, Json(task.to_execution_result())).into_response()
}

pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Response {
    let buyer_secret = headers
        .get("X-Buyer-Secret")
        .and_then(|v| v.to_str().ok());

    let Some(buyer_secret) = buyer_secret else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorEnvelope::new(
                ErrorKind::ValidationError,
                "X-Buyer-Secret header is required",
            )),
        )
            .into_response();
    };

    match state.repository.get(&task_id, buyer_secret).await {
        Some(task) => (StatusCode::OK, Json(task.to_execution_result())).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorEnvelope::new(ErrorKind::NotFound, "task not found")),
        )
            .into_response(),
    }
}

pub async fn pricing(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.payments.pricing.clone())).into_response()
}

pub async fn health() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

pub async fn openapi_doc() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "openapi": "3.0.0",
            "info": {"title": "seller-node", "version": "1"},
            "paths": {
                "/execute": {"post": {"summary": "Create a task and start execution"}},
                "/tasks/{task_id}": {"get": {"summary": "Poll task status"}},
                "/pricing": {"get": {"summary": "List monetized operations and prices"}},
                "/health": {"get": {"summary": "Liveness check"}},
            }
        })),
    )
        .into_response()
}

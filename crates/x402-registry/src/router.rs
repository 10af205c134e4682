use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use x402_types::{
    AgentProfile, AgentRegistrationRequest, ErrorEnvelope, ErrorKind, RegistrationResponse,
};

use crate::repository::{AgentRepository, AgentRepositoryError};

#[derive(Clone)]
pub struct MarketplaceState {
    pub repository: Arc<AgentRepository>,
}

pub fn marketplace_router(state: MarketplaceState) -> Router {
    Router::new()
        .route("/register", post(register_agent))
        .route("/register/new_entries", get(list_new_entries))
        .with_state(state)
}

async fn register_agent(
    State(state): State<MarketplaceState>,
    Json(request): Json<AgentRegistrationRequest>,
) -> Response {
    if !AgentProfile::validate_base_url(&request.base_url) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorEnvelope::new(
                ErrorKind::ValidationError,
                format!("Invalid HTTPS URL: {}", request.base_url),
            )),
        )
            .into_response();
    }

    let profile = AgentProfile::from_registration(request);
    match state.repository.create_agent(profile.clone()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(RegistrationResponse::from_profile(&profile)),
        )
            .into_response(),
        Err(AgentRepositoryError::AlreadyRegistered(message)) => (
            StatusCode::CONFLICT,
            Json(ErrorEnvelope::new(ErrorKind::Conflict, message)),
        )
            .into_response(),
        Err(AgentRepositoryError::NotFound(message)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorEnvelope::new(ErrorKind::NotFound, message)),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    100
}

async fn list_new_entries(
    State(state): State<MarketplaceState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<AgentProfile>> {
    Json(state.repository.list_agents(query.limit, query.offset).await)
}
